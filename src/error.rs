//! Error types for aria-pool
//!
//! Remote failures are caught at the task boundary and turned into an
//! `Error` status plus a notification, so most of these variants only reach
//! callers from the persistence layer, from configuration, or from the
//! engine client used on its own.

use crate::types::{CategoryKey, TaskKey};
use thiserror::Error;

/// Result type alias for aria-pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for aria-pool
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "engine.endpoint")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The engine answered with a fault or an unusable reply
    #[error("engine error: {0}")]
    Rpc(#[from] RpcError),

    /// Transport error talking to the engine
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task-level validation error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Task not found in the pool
    #[error("task not found: {0}")]
    NotFound(TaskKey),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Message shown to the user in a network-error notification.
    ///
    /// Engine faults carry their own message; everything else falls back to
    /// the display form.
    pub fn notification_message(&self) -> String {
        match self {
            Error::Rpc(RpcError::Fault { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Errors reported by (or about the replies of) the download engine
#[derive(Debug, Error)]
pub enum RpcError {
    /// JSON-RPC error object returned by the engine
    #[error("fault {code}: {message}")]
    Fault {
        /// Engine error code
        code: i64,
        /// Engine error message
        message: String,
    },

    /// Reply was missing fields or had the wrong shape
    #[error("invalid response to {method}: {reason}")]
    InvalidResponse {
        /// Remote method that produced the reply
        method: String,
        /// What was wrong with it
        reason: String,
    },

    /// Non-success HTTP status without a JSON-RPC body
    #[error("HTTP status {0}")]
    Http(u16),
}

/// Task validation errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Caller supplied an unusable task description
    #[error("invalid task: {0}")]
    InvalidInput(String),

    /// A BitTorrent or Metalink task has no metafile to submit
    #[error("task {key} has no metafile")]
    MissingMetafile {
        /// The task missing its metafile
        key: TaskKey,
    },

    /// Task refers to a category the pool does not know
    #[error("unknown category {0}")]
    UnknownCategory(CategoryKey),
}
