//! Error types for redis-walker
//!
//! This module defines the error hierarchy for:
//! - Store command errors (connection, server replies, malformed replies)
//! - Configuration and CLI errors
//! - Worker task errors
//!
//! Store errors carry their own classification (`is_retryable`,
//! `is_capability`, `is_cancellation`) so callers never match on message
//! text themselves.

use thiserror::Error;

/// Top-level error type for the redis-walker application
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Store command errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Errors raised while talking to the remote store
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// TCP connection was refused (the only retryable class)
    #[error("Connection refused: {reason}")]
    ConnectionRefused { reason: String },

    /// Connection-level failure other than refusal (I/O, timeout, dropped)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The store answered with an error reply
    #[error("{command} failed: {message}")]
    Server { command: String, message: String },

    /// The store does not support a command this operation needs
    #[error("{command} is not supported by this server (requires Redis 4.0+): {message}")]
    Unsupported { command: String, message: String },

    /// The reply had a shape the caller cannot interpret
    #[error("Malformed reply to {command}: {reason}")]
    MalformedReply { command: String, reason: String },

    /// A reply value could not be converted to the requested type
    #[error("Cannot read {actual} reply as {expected}")]
    Coercion {
        expected: &'static str,
        actual: &'static str,
    },

    /// The store reported a size that cannot be right
    #[error("Invalid size {size} reported for key '{key}'")]
    InvalidSize { key: String, size: i64 },

    /// All retry attempts failed
    #[error("{command} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        command: String,
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation deadline passed
    #[error("Operation deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    /// Check if this error should trigger another attempt
    ///
    /// Only refused connections are retried. Errors that were not mapped
    /// structurally fall back to matching the message text.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::ConnectionRefused { .. } => true,
            StoreError::Connection(message) | StoreError::Server { message, .. } => {
                looks_like_connection_refused(message)
            }
            _ => false,
        }
    }

    /// Check if this error means the server lacks a required feature
    pub fn is_capability(&self) -> bool {
        matches!(self, StoreError::Unsupported { .. })
    }

    /// Check if this error comes from cancellation or an expired deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StoreError::Cancelled | StoreError::DeadlineExceeded)
    }

    /// Convert a server rejection of `command` into a capability error
    ///
    /// Servers older than 4.0 answer `MEMORY USAGE` with "unknown command".
    /// Only error replies are considered; connection problems pass through.
    pub fn into_capability(self, command: &str) -> StoreError {
        match self {
            StoreError::Server { message, .. }
                if message.contains("unknown command") || message.contains(command) =>
            {
                StoreError::Unsupported {
                    command: command.to_string(),
                    message,
                }
            }
            other => other,
        }
    }
}

/// Heuristic match for refused TCP connections in error text
pub fn looks_like_connection_refused(message: &str) -> bool {
    message.contains("connection refused")
        || message.contains("Connection refused")
        || message.contains("actively refused it")
        || (message.contains("dial tcp") && message.contains("refused"))
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid store URL
    #[error("Invalid Redis URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Invalid database index
    #[error("Invalid database index {index}: must not be negative")]
    InvalidDatabase { index: i64 },

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid concurrency ceiling
    #[error("Invalid concurrency {count}: must be between 1 and {max}")]
    InvalidConcurrency { count: usize, max: usize },

    /// Invalid scan batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Invalid retry count
    #[error("Invalid retry count {count}: at least one attempt is required")]
    InvalidRetryCount { count: u32 },

    /// Invalid key value supplied on the command line
    #[error("Invalid value for {key_type} key: {reason}")]
    InvalidValue { key_type: String, reason: String },
}

/// Worker task errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;
