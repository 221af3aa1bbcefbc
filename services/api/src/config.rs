//! services/api/src/config.rs
//!
//! Defines the gateway's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

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
    /// Base URL of the deliberation backend, e.g. `https://app.example.org`.
    pub upstream_base_url: Url,
    pub upstream_timeout: Duration,
    pub log_level: Level,
    pub allowed_origin: String,
    pub advance_delay: Duration,
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

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Upstream Backend ---
        let upstream_str = lookup("UPSTREAM_BASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("UPSTREAM_BASE_URL".to_string()))?;
        let upstream_base_url = Url::parse(&upstream_str).map_err(|e| {
            ConfigError::InvalidValue("UPSTREAM_BASE_URL".to_string(), e.to_string())
        })?;

        let upstream_timeout = Duration::from_secs(parse_number(&lookup, "UPSTREAM_TIMEOUT_SECS", 10)?);

        // --- Session Pacing ---
        let advance_delay = Duration::from_millis(parse_number(
            &lookup,
            "ADVANCE_DELAY_MS",
            deliberation_core::ADVANCE_DELAY.as_millis() as u64,
        )?);

        Ok(Self {
            bind_address,
            upstream_base_url,
            upstream_timeout,
            log_level,
            allowed_origin,
            advance_delay,
        })
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
