//! Error types for the Replisync library
//!
//! Only startup and configuration problems surface as errors. Once a sync
//! loop is running, per-file and per-directory failures are converted into
//! outcome values (see [`crate::types::OperationOutcome`]) and diagnostics,
//! so a cycle always runs to completion.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the Replisync library
pub type Result<T> = std::result::Result<T, ReplisyncError>;

/// Main error type for all Replisync operations
#[derive(Debug, Error)]
pub enum ReplisyncError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Source directory is missing or not a directory
    #[error("Source directory not found: {0:?}")]
    SourceNotFound(PathBuf),

    /// Replica path exists but is not a directory
    #[error("Replica path is not a directory: {0:?}")]
    ReplicaNotDirectory(PathBuf),

    /// Interval argument could not be parsed or is zero
    #[error("Invalid interval '{0}': expected a positive number of seconds")]
    InvalidInterval(String),

    /// Exclude pattern could not be compiled
    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Event log file could not be opened or written
    #[error("Log file error for {path:?}: {source}")]
    LogSink {
        /// Path of the log file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// File could not be copied into the replica
    #[error("Copy failed {from:?} -> {to:?}: {source}")]
    CopyFailed {
        /// Source file
        from: PathBuf,
        /// Replica destination
        to: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Replica file could not be removed
    #[error("Delete failed for {path:?}: {source}")]
    DeleteFailed {
        /// Replica file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplisyncError {
    /// Create an invalid configuration error with a custom message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ReplisyncError::InvalidConfiguration(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ReplisyncError::Internal(msg.into())
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            ReplisyncError::SourceNotFound(path) => {
                format!("Source directory {:?} does not exist. Check the first argument.", path)
            }
            ReplisyncError::InvalidInterval(raw) => {
                format!("'{}' is not a valid interval. Pass a whole number of seconds greater than zero.", raw)
            }
            ReplisyncError::LogSink { path, source } => {
                format!("Cannot append to log file {:?} ({}). Make sure its directory exists.", path, source)
            }
            _ => self.to_string(),
        }
    }
}
