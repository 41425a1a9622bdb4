//! Runtime settings for the sync engine and CLI.
//!
//! ```bash
//! COHORT_ORIGIN=https://cohort.example   # join-link origin
//! COHORT_DATABASE_URL=sqlite://cohort.db # defaults to ~/.cohort/cohort.db
//! COHORT_COUNTDOWN_SECS=60               # countdown refresh interval
//! COHORT_EVENT_CAPACITY=100              # per-channel broadcast buffer
//! ```

use crate::{config_dir, ConfigError};
use std::env;
use std::time::Duration;

pub const ENV_ORIGIN: &str = "COHORT_ORIGIN";
pub const ENV_DATABASE_URL: &str = "COHORT_DATABASE_URL";
pub const ENV_COUNTDOWN_SECS: &str = "COHORT_COUNTDOWN_SECS";
pub const ENV_EVENT_CAPACITY: &str = "COHORT_EVENT_CAPACITY";

pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_COUNTDOWN_SECS: u64 = 60;
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Origin used to build join links.
    pub origin: String,
    /// Explicit database URL; `None` means the default file under ~/.cohort.
    pub database_url: Option<String>,
    pub countdown_interval: Duration,
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            database_url: None,
            countdown_interval: Duration::from_secs(DEFAULT_COUNTDOWN_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin = lookup(ENV_ORIGIN)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let database_url = lookup(ENV_DATABASE_URL).filter(|v| !v.trim().is_empty());

        let countdown_secs =
            parse_positive(ENV_COUNTDOWN_SECS, lookup(ENV_COUNTDOWN_SECS), DEFAULT_COUNTDOWN_SECS)?;
        let event_capacity = parse_positive(
            ENV_EVENT_CAPACITY,
            lookup(ENV_EVENT_CAPACITY),
            DEFAULT_EVENT_CAPACITY as u64,
        )?;

        Ok(Self {
            origin,
            database_url,
            countdown_interval: Duration::from_secs(countdown_secs),
            event_capacity: usize::try_from(event_capacity).map_err(|_| {
                ConfigError::InvalidNumber {
                    name: ENV_EVENT_CAPACITY.to_string(),
                    value: event_capacity.to_string(),
                }
            })?,
        })
    }

    /// The database URL to open, falling back to ~/.cohort/cohort.db.
    pub fn resolved_database_url(&self) -> Result<String, ConfigError> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => Ok(format!(
                "sqlite://{}",
                config_dir()?.join("cohort.db").display()
            )),
        }
    }
}

fn parse_positive(name: &str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name: name.to_string(),
            value: raw,
        }),
    }
}
