//! Error types for the fuzzing harness.
//!
//! Only a handful of these are fatal to a campaign (a missing payload
//! corpus, an invalid configuration). Everything that happens inside a
//! single connection is caught by the session and turned into a log event.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for harness operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The payload corpus could not be loaded
    #[error("Failed to load payload corpus {}: {source}", path.display())]
    Corpus {
        /// Path of the corpus file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Timeout errors
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Transport-specific errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Send or close attempted on a connection that is already gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// The connection could not be established
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The upstream HTTP proxy refused the tunnel
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// TLS setup error (when feature enabled)
    #[cfg(feature = "websocket")]
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// WebSocket error (when feature enabled)
    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the peer was already gone when the operation started.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::ConnectionClosed))
    }
}
