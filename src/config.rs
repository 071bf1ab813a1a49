//! Environment-driven configuration.
//!
//! Environment variables:
//! - `ROOMALLOC_DB_PATH` - SQLite database location (default: `roomalloc.db`)
//! - `ROOMALLOC_DB_CREATE` - create the database when missing (default: true)
//! - `ROOMALLOC_BUSY_TIMEOUT_MS` - SQLite busy timeout (default: 5000)
//! - `ROOMALLOC_SEED_ROOMS` - seed the in-memory fallback (default: true)
//! - `ROOMALLOC_LOG_LEVEL` - log filter when `RUST_LOG` is unset (default: info)

use std::path::PathBuf;

use thiserror::Error;

use crate::{bootstrap::StoreConfig, gateway::sqlite::RelationalConfig};

/// Malformed configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set but does not parse.
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend selection settings.
    pub store: StoreConfig,
    /// Fallback log filter.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads variables through `lookup`; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let relational: &mut RelationalConfig = &mut config.store.relational;

        if let Some(path) = lookup("ROOMALLOC_DB_PATH") {
            relational.path = PathBuf::from(path);
        }
        if let Some(create) = read(&lookup, "ROOMALLOC_DB_CREATE", parse_bool)? {
            relational.create_if_missing = create;
        }
        if let Some(ms) = read(&lookup, "ROOMALLOC_BUSY_TIMEOUT_MS", parse_u64)? {
            relational.busy_timeout_ms = ms;
        }
        if let Some(seed) = read(&lookup, "ROOMALLOC_SEED_ROOMS", parse_bool)? {
            config.store.seed_fallback_rooms = seed;
        }
        if let Some(level) = lookup("ROOMALLOC_LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }
}

fn read<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    parse(value.trim())
        .map(Some)
        .ok_or(ConfigError::Invalid { key, value })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u64(raw: &str) -> Option<u64> {
    raw.parse().ok()
}
