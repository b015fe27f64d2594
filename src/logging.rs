//! Logging setup.
//!
//! The library only emits `tracing` events. Embedders that have no
//! subscriber of their own can call [`init`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ConfigResult, LoggingConfig};

/// Filter from `RUST_LOG`, else from the configured level
pub fn filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::Logging(format!("bad level '{}': {}", config.level, e))),
    }
}

/// Install a fmt subscriber as the global default
///
/// Fails if the level is malformed or a global subscriber already exists.
pub fn init(config: &LoggingConfig) -> ConfigResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config)?)
        .with_target(true)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "sysbind=loud".to_string(),
        };
        assert!(matches!(filter(&config), Err(ConfigError::Logging(_))));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
