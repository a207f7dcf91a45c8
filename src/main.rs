use garbage_sorter::config::{Config, StatsdConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Some(statsd) = &config.statsd {
        install_statsd_recorder(statsd);
    }

    if let Err(e) = garbage_sorter::run(config).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

/// Metrics are a no-op unless a statsd target is configured.
fn install_statsd_recorder(statsd: &StatsdConfig) {
    let recorder = match StatsdBuilder::from(statsd.host.clone(), statsd.port)
        .build(Some("garbage_sorter"))
    {
        Ok(recorder) => recorder,
        Err(e) => {
            tracing::warn!(error = %e, "failed to set up statsd exporter");
            return;
        }
    };

    if let Err(e) = metrics::set_global_recorder(recorder) {
        tracing::warn!(error = %e, "failed to install metrics recorder");
    }
}
