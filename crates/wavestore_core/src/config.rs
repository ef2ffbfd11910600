//! Store configuration.
//!
//! # Invariants
//! - Timeouts are non-zero.
//! - A configured database path is absolute.

use crate::db::DEFAULT_BUSY_TIMEOUT;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for the first-run seeding call chain.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings used by `WaveStore::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub db_path: Option<PathBuf>,
    /// How long a substrate call waits on a locked database file.
    pub busy_timeout: Duration,
    /// How long startup seeding may wait on the substrate.
    pub init_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// File-backed configuration with default timeouts.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("busy_timeout"));
        }
        if self.init_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("init_timeout"));
        }
        if let Some(path) = &self.db_path {
            if !path.is_absolute() {
                return Err(ConfigError::RelativeDbPath(path.clone()));
            }
        }
        Ok(())
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroTimeout(&'static str),
    RelativeDbPath(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroTimeout(field) => write!(f, "{field} must be greater than zero"),
            Self::RelativeDbPath(path) => {
                write!(f, "db_path must be absolute, got `{}`", path.display())
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig};
    use std::time::Duration;

    #[test]
    fn default_config_is_valid_and_in_memory() {
        let config = StoreConfig::default();
        assert!(config.db_path.is_none());
        assert!(config.validate().is_ok());
        assert!(config.init_timeout < config.busy_timeout);
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = StoreConfig {
            init_timeout: Duration::ZERO,
            ..StoreConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroTimeout("init_timeout"))
        );
    }

    #[test]
    fn relative_db_path_is_rejected() {
        let err = StoreConfig::with_db_path("state/wave.db")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }
}
