mod identity;
mod sync;

pub use identity::{IdentityConfig, IdentityEntry};
pub use sync::{
    SyncConfig, DEFAULT_COUNTDOWN_SECS, DEFAULT_EVENT_CAPACITY, DEFAULT_ORIGIN, ENV_COUNTDOWN_SECS,
    ENV_DATABASE_URL, ENV_EVENT_CAPACITY, ENV_ORIGIN,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found. Run 'cohort login' first.")]
    NotFound,
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine home directory")]
    NoHomeDir,
    #[error("No identity is signed in")]
    NotSignedIn,
    #[error("Invalid number for {name}: {value}")]
    InvalidNumber { name: String, value: String },
}

/// Directory holding cohort's local state (~/.cohort).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".cohort"))
        .ok_or(ConfigError::NoHomeDir)
}
