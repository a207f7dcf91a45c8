pub mod api;
pub mod classifier;
pub mod config;
pub mod metrics_defs;
pub mod rate_limit;
pub mod storage;

use crate::api::AppState;
use crate::classifier::Classifier;
use crate::config::Config;
use crate::storage::RecordStore;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serve the classification API until the process is stopped.
pub async fn run(config: Config) -> Result<(), ServeError> {
    let state = AppState {
        classifier: Classifier::from_config(&config),
        store: RecordStore::new(&config.storage.url, config.storage.key.clone()),
    };
    let app = api::app(state);

    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    tracing::info!(addr = %addr, "listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
