use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub collections: CollectionNames,
    pub aggregator: AggregatorConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Upstream collection names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionNames {
    pub appointments: String,
    pub doctors: String,
    pub patients: String,
    pub requests: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        CollectionNames {
            appointments: "Appointements".to_string(),  // sic, matches the hosted database
            doctors: "Doctors".to_string(),
            patients: "Patient".to_string(),
            requests: "requests".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Upper bound on doctor/patient lookups in flight at once.
    pub max_concurrent_lookups: usize,
    /// Capacity of the event side channel; slow listeners see `Lagged`.
    pub event_buffer: usize,
    /// Drop lookup results that belong to an older snapshot pass instead of
    /// letting them land last-write-wins.
    pub discard_stale_resolutions: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            max_concurrent_lookups: 16,
            event_buffer: 64,
            discard_stale_resolutions: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub seed_path: Option<PathBuf>,
    pub dump_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregator.max_concurrent_lookups == 0 {
            return Err(ConfigError::Invalid("aggregator.max_concurrent_lookups must be at least 1".to_string()));
        }
        if self.aggregator.event_buffer == 0 {
            return Err(ConfigError::Invalid("aggregator.event_buffer must be at least 1".to_string()));
        }
        if self.collections.appointments.is_empty() {
            return Err(ConfigError::Invalid("collections.appointments must not be empty".to_string()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_yaml(&text)
}
