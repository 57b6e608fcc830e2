//! Error types for the record store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error (file system).
    #[error("IO error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A stored document could not be decoded.
    #[error("corrupt license document {path}: {source}")]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// Decoder diagnostic.
        source: serde_json::Error,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another handle held the fingerprint lock for longer than the timeout.
    #[error("timed out waiting for license lock {path}")]
    LockTimeout {
        /// Lock file that stayed held.
        path: PathBuf,
    },

    /// Every candidate history file name was already taken.
    #[error("history slot exhausted for {0}")]
    HistoryExhausted(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
