//! Error types and result aliases for ask.
//!
//! This module defines the core error type [`AskError`] and the [`Result`] type alias
//! used throughout the library. All public APIs that can fail return `Result<T>` for
//! consistent error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AskError {
    #[error("Ollama gateway error: {0}")]
    Gateway(String),

    #[error("Could not connect to Ollama at {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AskError {
    /// Classify a transport error raised while talking to `host`.
    pub fn from_request(host: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AskError::Timeout(err.to_string())
        } else if err.is_connect() {
            AskError::Connection {
                host: host.to_string(),
                source: err,
            }
        } else {
            AskError::Http(err)
        }
    }

    /// Whether the server could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, AskError::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, AskError>;
