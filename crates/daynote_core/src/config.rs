//! Process configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Read logging settings from `DAYNOTE_LOG_LEVEL` / `DAYNOTE_LOG_DIR`.
//! - Validate them before logging starts.
//!
//! # Invariants
//! - An unset level falls back to `logging::default_log_level()`.
//! - An unset or blank directory disables file logging.

use crate::logging::{default_log_level, init_logging, normalize_level, normalize_log_dir};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const LOG_LEVEL_ENV: &str = "DAYNOTE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "DAYNOTE_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnsupportedLevel(String),
    InvalidLogDir(String),
    /// Logger backend refused to start.
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(message) => write!(f, "{LOG_LEVEL_ENV}: {message}"),
            Self::InvalidLogDir(message) => write!(f, "{LOG_DIR_ENV}: {message}"),
            Self::Logging(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub log_level: &'static str,
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let log_level = match lookup(LOG_LEVEL_ENV).filter(|value| !value.trim().is_empty()) {
            Some(value) => normalize_level(&value).map_err(ConfigError::UnsupportedLevel)?,
            None => default_log_level(),
        };
        let log_dir = match lookup(LOG_DIR_ENV).filter(|value| !value.trim().is_empty()) {
            Some(value) => Some(
                normalize_log_dir(PathBuf::from(value.trim()).as_path())
                    .map_err(ConfigError::InvalidLogDir)?,
            ),
            None => None,
        };
        Ok(Self { log_level, log_dir })
    }

    /// Starts file logging when a directory is configured; returns whether
    /// logging is active.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(log_dir) = self.log_dir.as_deref() else {
            return Ok(false);
        };
        init_logging(self.log_level, log_dir).map_err(ConfigError::Logging)?;
        Ok(true)
    }
}
