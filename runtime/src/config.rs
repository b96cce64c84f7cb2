//! Driver configuration, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tuning knobs for [`FlowDriver`](crate::driver::FlowDriver).
///
/// ```toml
/// channel_capacity = 32
/// lookup_timeout_ms = 10000
/// challenge_timeout_ms = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Bound of the host event channel.
    pub channel_capacity: usize,
    /// How long an eligibility lookup may run before it counts as failed.
    pub lookup_timeout_ms: u64,
    /// How long a challenge may stay open before it counts as dismissed.
    pub challenge_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
            lookup_timeout_ms: 10_000,
            challenge_timeout_ms: 60_000,
        }
    }
}

impl DriverConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_millis(self.challenge_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "lookup_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
