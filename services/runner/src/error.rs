//! services/runner/src/error.rs
//!
//! Defines the primary error type for the runner service.

use crate::config::ConfigError;

/// The primary error type for the `runner` service.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Building the HTTP client for the remote session API failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
