//! Runtime configuration.
//!
//! Values come from environment variables with built-in defaults:
//! - `CUBIT_DATA_DIR` - directory for the project snapshot and credential
//! - `CUBIT_MODEL` - Gemini model used for every extraction call
//! - `GEMINI_API_BASE` - API base URL
//! - `CUBIT_MIN_CALL_INTERVAL_MS` - spacing between model calls
//! - `CUBIT_HTTP_TIMEOUT_SECS` - per-request HTTP timeout

use std::path::PathBuf;
use std::time::Duration;

use crate::llm::{GEMINI_API_BASE, MIN_CALL_INTERVAL};

pub const DEFAULT_DATA_DIR: &str = ".cubit-connect";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub model: String,
    pub api_base: String,
    pub min_call_interval: Duration,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            model: DEFAULT_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            min_call_interval: MIN_CALL_INTERVAL,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let min_call_interval = match get("CUBIT_MIN_CALL_INTERVAL_MS") {
            Some(v) => Duration::from_millis(parse_number("CUBIT_MIN_CALL_INTERVAL_MS", &v)?),
            None => defaults.min_call_interval,
        };
        let http_timeout = match get("CUBIT_HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("CUBIT_HTTP_TIMEOUT_SECS", &v)?),
            None => defaults.http_timeout,
        };

        Ok(Self {
            data_dir: get("CUBIT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            model: get("CUBIT_MODEL").unwrap_or(defaults.model),
            api_base: get("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            min_call_interval,
            http_timeout,
        })
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.min_call_interval, Duration::from_millis(2000));
        assert_eq!(config.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CUBIT_DATA_DIR", "/tmp/cubit"),
            ("CUBIT_MODEL", "gemini-2.0-flash"),
            ("CUBIT_MIN_CALL_INTERVAL_MS", "500"),
            ("CUBIT_HTTP_TIMEOUT_SECS", " 30 "),
            ("GEMINI_API_BASE", ""),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/cubit"));
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.min_call_interval, Duration::from_millis(500));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.api_base, GEMINI_API_BASE);
    }

    #[test]
    fn test_invalid_number() {
        let err =
            Config::from_lookup(lookup(&[("CUBIT_MIN_CALL_INTERVAL_MS", "fast")])).unwrap_err();
        assert!(err.to_string().contains("CUBIT_MIN_CALL_INTERVAL_MS"));
    }
}
