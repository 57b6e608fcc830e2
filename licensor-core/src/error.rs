//! Error types for license lifecycle decisions.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Policy configuration could not be parsed.
    #[error("invalid policy config: {0}")]
    Config(String),

    /// A stored timestamp could not be parsed.
    #[error("invalid date {value:?} on license {fingerprint}: {reason}")]
    DateParse {
        /// Fingerprint of the offending record.
        fingerprint: String,
        /// The raw stored value.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Issuance duration must be a positive number of days.
    #[error("license duration must be a positive number of days, got {0}")]
    InvalidDuration(i64),

    /// A version string has a missing or non-numeric component.
    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),

    /// Error raised by the record store, passed through unchanged.
    #[error(transparent)]
    Storage(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A record could not be encoded for output.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Wraps a record store error without altering it.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// A per-record failure inside a batch operation.
///
/// Batches collect these instead of stopping at the first error.
#[derive(Debug)]
pub struct RecordFailure {
    /// Fingerprint of the record that failed.
    pub fingerprint: String,
    /// What went wrong.
    pub error: LicenseError,
}

impl RecordFailure {
    /// Creates a failure entry for the given fingerprint.
    #[must_use]
    pub fn new(fingerprint: impl Into<String>, error: LicenseError) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            error,
        }
    }
}
