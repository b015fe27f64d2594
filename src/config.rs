//! Sysbind Configuration
//!
//! Handles parsing and management of sysbind.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// File name searched for by [`SysbindConfig::find_and_load`]
pub const CONFIG_FILE_NAME: &str = "sysbind.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching sysbind.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SysbindConfig {
    /// Buffer allocation settings
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Object registry limits
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Table bridge limits
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Log filter
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SysbindConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: SysbindConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    ///
    /// Falls back to defaults when no file exists up to the root.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Buffer allocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Largest single buffer allocation in bytes
    #[serde(default = "default_max_allocation")]
    pub max_allocation: usize,

    /// Whether new buffers may appear in dumps
    #[serde(default = "default_true")]
    pub dumpable_by_default: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_allocation: default_max_allocation(),
            dumpable_by_default: true,
        }
    }
}

fn default_max_allocation() -> usize {
    64 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Object registry limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Live object ceiling
    #[serde(default = "default_max_objects")]
    pub max_objects: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_objects: default_max_objects(),
        }
    }
}

fn default_max_objects() -> usize {
    1 << 20
}

/// Table bridge limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Largest cardinality accepted by an import
    #[serde(default = "default_max_cardinality")]
    pub max_cardinality: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_cardinality: default_max_cardinality(),
        }
    }
}

fn default_max_cardinality() -> usize {
    65536
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Pending helper-thread events before pushes fail
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handoff_capacity: default_handoff_capacity(),
        }
    }
}

fn default_handoff_capacity() -> usize {
    256
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sysbind-config-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = SysbindConfig::default();
        assert_eq!(config.buffer.max_allocation, 64 * 1024 * 1024);
        assert!(config.buffer.dumpable_by_default);
        assert_eq!(config.bridge.max_cardinality, 65536);
        assert_eq!(config.session.handoff_capacity, 256);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[buffer]
max_allocation = 4096
dumpable_by_default = false

[bridge]
max_cardinality = 10

[logging]
level = "sysbind=trace"
"#;

        let config: SysbindConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.buffer.max_allocation, 4096);
        assert!(!config.buffer.dumpable_by_default);
        assert_eq!(config.bridge.max_cardinality, 10);
        assert_eq!(config.registry, RegistryConfig::default());
        assert_eq!(config.logging.level, "sysbind=trace");
    }

    #[test]
    fn test_parse_error() {
        let result: Result<SysbindConfig, _> =
            toml::from_str("[buffer]\nmax_allocation = \"lots\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_find() {
        let root = scratch_dir("find");
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let mut config = SysbindConfig::default();
        config.registry.max_objects = 12;
        config.save(&root.join(CONFIG_FILE_NAME)).unwrap();

        let found = SysbindConfig::find_and_load(&nested).unwrap();
        assert_eq!(found, config);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let dir = scratch_dir("missing");
        let result = SysbindConfig::load(&dir.join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
