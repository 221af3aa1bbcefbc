//! services/api/src/error.rs
//!
//! Defines the primary error type for the gateway service.

use crate::config::ConfigError;
use deliberation_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the HTTP client talking to the upstream backend.
    #[error("Upstream HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents an error related to the WebSocket connection.
    #[error("WebSocket Error: {0}")]
    Websocket(#[from] axum::Error),

    /// Represents a failure to encode a protocol message.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
