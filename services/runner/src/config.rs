//! services/runner/src/config.rs
//!
//! Defines the runner's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Base URL of the remote session API, without a trailing slash.
    pub session_api_url: String,
    pub session_api_token: Option<String>,
    pub rest_state_path: PathBuf,
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub ui_origin: String,
    /// Session to load right after startup, if any.
    pub resume_session_id: Option<Uuid>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to keep tests hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3100".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let ui_origin =
            lookup("UI_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Remote Session API ---
        let session_api_url = lookup("SESSION_API_URL")
            .ok_or_else(|| ConfigError::MissingVar("SESSION_API_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();
        if !session_api_url.starts_with("http://") && !session_api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "SESSION_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", session_api_url),
            ));
        }
        let session_api_token = lookup("SESSION_API_TOKEN").filter(|t| !t.trim().is_empty());

        let timeout_secs = parse_u64(&lookup, "REQUEST_TIMEOUT_SECS", 15)?;
        let request_timeout = Duration::from_secs(timeout_secs);

        // --- Rest Timer ---
        let rest_state_path = lookup("REST_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.workout-rest-state.json"));

        let tick_ms = parse_u64(&lookup, "TICK_INTERVAL_MS", 1000)?;
        if tick_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TICK_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let tick_interval = Duration::from_millis(tick_ms);

        let resume_session_id = match lookup("RESUME_SESSION_ID") {
            Some(raw) => Some(Uuid::parse_str(raw.trim()).map_err(|e| {
                ConfigError::InvalidValue("RESUME_SESSION_ID".to_string(), e.to_string())
            })?),
            None => None,
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            session_api_url,
            session_api_token,
            rest_state_path,
            tick_interval,
            request_timeout,
            ui_origin,
            resume_session_id,
            log_level,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_api_url_is_set() {
        let config =
            Config::from_lookup(lookup_from(&[("SESSION_API_URL", "https://api.example.com/")]))
                .unwrap();
        assert_eq!(config.session_api_url, "https://api.example.com");
        assert_eq!(config.bind_address.port(), 3100);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.session_api_token.is_none());
        assert!(config.resume_session_id.is_none());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn missing_api_url_is_reported() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "SESSION_API_URL"));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("SESSION_API_URL", "http://localhost:8080"),
            ("TICK_INTERVAL_MS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "TICK_INTERVAL_MS"));
    }

    #[test]
    fn blank_token_counts_as_absent() {
        let config = Config::from_lookup(lookup_from(&[
            ("SESSION_API_URL", "http://localhost:8080"),
            ("SESSION_API_TOKEN", "  "),
            ("RESUME_SESSION_ID", "6f1c7a52-2f43-4b8e-9d0a-0c1f5c1d2e3f"),
        ]))
        .unwrap();
        assert!(config.session_api_token.is_none());
        assert!(config.resume_session_id.is_some());
    }
}
