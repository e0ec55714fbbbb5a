//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

/// hoodproxy error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The listen address could not be bound (in use, invalid or unresolvable)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was being bound
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// The destination refused the connection or was unreachable
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Destination address
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// `run()` was called on a proxy that is already running
    #[error("Cannot start proxy while it is already running")]
    AlreadyRunning,

    /// `stop()` was called on a proxy that is already stopped, or `run()` after a stop
    #[error("Proxy is already stopped")]
    AlreadyStopped,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<config::ConfigError> for ProxyError {
    fn from(err: config::ConfigError) -> Self {
        ProxyError::Config(err.to_string())
    }
}
