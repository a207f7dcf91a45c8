use std::env;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, url::ParseError),

    #[error("invalid port in {0}: {1}")]
    InvalidPort(&'static str, std::num::ParseIntError),

    #[error("listener port cannot be 0")]
    ZeroPort,

    #[error("unknown classifier backend: {0} (expected \"rest\" or \"generative\")")]
    UnknownBackend(String),
}

/// Network listener configuration
#[derive(Clone, Debug)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Which label provider the service forwards images to.
///
/// The two backends are selected here and nowhere else; the handler never
/// inspects the variant at request time.
#[derive(Clone, Debug)]
pub enum BackendConfig {
    /// Generic REST classification endpoint with rate-limit retry.
    Rest { url: Url },
    /// Generative model invoked with a fixed instruction and an inline
    /// image payload. Failures are terminal, there is no retry.
    Generative { url: Url },
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub url: Url,
    pub key: String,
}

#[derive(Clone, Debug)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16,
}

/// Process-wide configuration, read once at startup and passed into the
/// handler state explicitly.
#[derive(Clone, Debug)]
pub struct Config {
    pub listener: Listener,
    pub backend: BackendConfig,
    pub classifier_api_key: String,
    pub storage: StorageConfig,
    pub statsd: Option<StatsdConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// `from_env` delegates here; tests supply their own lookup so they do
    /// not have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("CLASSIFIER_BACKEND").as_deref() {
            None | Some("rest") => BackendConfig::Rest {
                url: require_url(&lookup, "CLASSIFIER_URL")?,
            },
            Some("generative") => BackendConfig::Generative {
                url: require_url(&lookup, "GENERATIVE_URL")?,
            },
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let listener = Listener::default();
        let host = lookup("LISTEN_HOST").unwrap_or(listener.host);
        let port = match lookup("LISTEN_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidPort("LISTEN_PORT", e))?,
            None => listener.port,
        };
        if port == 0 {
            return Err(ConfigError::ZeroPort);
        }

        let statsd = match lookup("STATSD_HOST") {
            Some(statsd_host) => {
                let statsd_port = match lookup("STATSD_PORT") {
                    Some(raw) => raw
                        .parse::<u16>()
                        .map_err(|e| ConfigError::InvalidPort("STATSD_PORT", e))?,
                    None => 8125,
                };
                Some(StatsdConfig {
                    host: statsd_host,
                    port: statsd_port,
                })
            }
            None => None,
        };

        Ok(Config {
            listener: Listener { host, port },
            backend,
            classifier_api_key: require(&lookup, "CLASSIFIER_API_KEY")?,
            storage: StorageConfig {
                url: require_url(&lookup, "SUPABASE_URL")?,
                key: require(&lookup, "SUPABASE_KEY")?,
            },
            statsd,
        })
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or(ConfigError::MissingVar(key))
}

fn require_url<F>(lookup: &F, key: &'static str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = require(lookup, key)?;
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(key, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn rest_backend_with_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("CLASSIFIER_URL", "https://classifier.example.com/classify"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role"),
        ]))
        .expect("load config");

        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.listener.port, 3000);
        assert!(config.statsd.is_none());
        match config.backend {
            BackendConfig::Rest { url } => {
                assert_eq!(url.as_str(), "https://classifier.example.com/classify");
            }
            BackendConfig::Generative { .. } => panic!("expected rest backend"),
        }
    }

    #[test]
    fn generative_backend_requires_its_url() {
        let result = Config::from_lookup(lookup(&[
            ("CLASSIFIER_BACKEND", "generative"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role"),
        ]));

        assert!(matches!(
            result.unwrap_err(),
            ConfigError::MissingVar("GENERATIVE_URL")
        ));
    }

    #[test]
    fn generative_backend_selected() {
        let config = Config::from_lookup(lookup(&[
            ("CLASSIFIER_BACKEND", "generative"),
            ("GENERATIVE_URL", "https://model.example.com/generate"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role"),
        ]))
        .expect("load config");

        assert!(matches!(config.backend, BackendConfig::Generative { .. }));
    }

    #[test]
    fn unknown_backend_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("CLASSIFIER_BACKEND", "oracle"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role"),
        ]));

        assert!(matches!(result.unwrap_err(), ConfigError::UnknownBackend(b) if b == "oracle"));
    }

    #[test]
    fn malformed_url_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("CLASSIFIER_URL", "not-a-url"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role"),
        ]));

        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidUrl("CLASSIFIER_URL", _)
        ));
    }

    #[test]
    fn missing_storage_credentials_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("CLASSIFIER_URL", "https://classifier.example.com/classify"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
        ]));

        assert!(matches!(
            result.unwrap_err(),
            ConfigError::MissingVar("SUPABASE_KEY")
        ));
    }

    #[test]
    fn zero_port_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("CLASSIFIER_URL", "https://classifier.example.com/classify"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role"),
            ("LISTEN_PORT", "0"),
        ]));

        assert!(matches!(result.unwrap_err(), ConfigError::ZeroPort));
    }

    #[test]
    fn listener_and_statsd_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CLASSIFIER_URL", "https://classifier.example.com/classify"),
            ("CLASSIFIER_API_KEY", "key"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role"),
            ("LISTEN_HOST", "0.0.0.0"),
            ("LISTEN_PORT", "8080"),
            ("STATSD_HOST", "statsd.internal"),
        ]));
        let config = config.expect("load config");

        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.listener.port, 8080);
        let statsd = config.statsd.expect("statsd config");
        assert_eq!(statsd.host, "statsd.internal");
        assert_eq!(statsd.port, 8125);
    }
}
