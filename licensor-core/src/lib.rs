//! License lifecycle authority.
//!
//! This crate decides everything about a license's life:
//! - Parsing and validating activation/reactivation requests
//! - Version compatibility policy (new activations vs. reactivations)
//! - Deterministic license key derivation and issuance
//! - Expiry scanning with a lookahead window
//! - Reactivation that extends the current expiry
//!
//! # Design Principles
//!
//! - **Explicit inputs**: policy config and the clock are passed in, never
//!   read from the environment
//! - **Derived expiring state**: "expiring" is computed from
//!   `(status, expires_date, now, window)` and never stored
//! - **Batch isolation**: one malformed record never aborts a scan or a
//!   reactivation batch
//! - **Delegated persistence**: records live in a [`RecordStore`]; the core
//!   reads current state and writes a new state on every decision
//!
//! # License Key Format
//!
//! Keys are the first 32 hex characters (upper-cased) of
//! `SHA-256("<fingerprint>:<company>:<email>:<issued-at RFC 3339>")`.
//! A key is an identifier, not a verifiable credential.

mod clock;
mod config;
mod error;
mod expiry;
mod issuer;
mod lifecycle;
mod reactivation;
mod record;
mod report;
mod request;
mod store;
mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    PolicyConfig, DEFAULT_DURATION_DAYS, DEFAULT_EXPIRY_WINDOW_DAYS, DEFAULT_VERSION,
};
pub use error::{LicenseError, LicenseResult, RecordFailure};
pub use expiry::{ExpiryScanner, LifecycleState, ScanReport};
pub use issuer::{derive_license_key, LicenseIssuer, LICENSE_KEY_LEN};
pub use lifecycle::{LifecycleDecision, LifecycleOrchestrator};
pub use reactivation::{
    reactivate, reactivate_batch, ReactivationReport, REACTIVATION_EXTENSION_DAYS,
};
pub use record::{LicenseRecord, RecordStatus, RecordTimestamp};
pub use report::{MemorySink, Report, ReportSink};
pub use request::{
    extract_version, validate_request, ActivationRequest, HardwareFingerprint, RequestKind,
    ValidationError, ValidationOutcome, FINGERPRINT_LEN,
};
pub use store::{
    FingerprintLocks, MemoryRecordStore, RecordStore, StoredRecords, UnreadableRecord,
};
pub use version::{compare_versions, evaluate_version, try_compare_versions, VersionDecision};
