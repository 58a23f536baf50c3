//! Engine configuration, sourced from the process environment.

use thiserror::Error;
use tracing::info;

const BROKER_URL: &str = "RELAY_BROKER_URL";
const RESULT_BACKEND: &str = "RELAY_RESULT_BACKEND";
const FILER_URL: &str = "RELAY_FILER_URL";
const WORKERS: &str = "RELAY_WORKERS";

const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent. There are no fallbacks for connection
    /// endpoints; startup must abort.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Connection endpoints and worker sizing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Message broker endpoint.
    pub broker_url: String,

    /// Result backend endpoint.
    pub result_backend: String,

    /// Blob store endpoint.
    pub filer_url: String,

    /// Number of concurrent workers.
    pub workers: usize,
}

impl EngineConfig {
    /// Load from the process environment. Missing required variables are
    /// fatal at startup rather than at first use.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load via an arbitrary variable lookup. Tests inject a map here instead
    /// of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let broker_url = required(BROKER_URL)?;
        let result_backend = required(RESULT_BACKEND)?;
        let filer_url = required(FILER_URL)?;

        let workers = match lookup(WORKERS) {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: WORKERS,
                    value: raw,
                })?,
            None => DEFAULT_WORKERS,
        };

        let config = Self {
            broker_url,
            result_backend,
            filer_url,
            workers,
        };
        info!(
            broker_url = %config.broker_url,
            result_backend = %config.result_backend,
            filer_url = %config.filer_url,
            workers = config.workers,
            "configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full() -> HashMap<String, String> {
        env(&[
            (BROKER_URL, "redis://localhost:6379/0"),
            (RESULT_BACKEND, "redis://localhost:6379/1"),
            (FILER_URL, "http://localhost:8888"),
        ])
    }

    #[test]
    fn loads_required_endpoints() {
        let vars = full();
        let config = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.broker_url, "redis://localhost:6379/0");
        assert_eq!(config.result_backend, "redis://localhost:6379/1");
        assert_eq!(config.filer_url, "http://localhost:8888");
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn missing_endpoint_is_fatal() {
        let mut vars = full();
        vars.remove(FILER_URL);

        let err = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(FILER_URL)));
    }

    #[test]
    fn worker_count_override() {
        let mut vars = full();
        vars.insert(WORKERS.to_string(), "12".to_string());

        let config = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.workers, 12);
    }

    #[test]
    fn garbage_worker_count_is_rejected() {
        for bad in ["zero", "-1", "0", ""] {
            let mut vars = full();
            vars.insert(WORKERS.to_string(), bad.to_string());

            let err = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "value: {bad:?}");
        }
    }
}
