//! Filesystem storage for license records.
//!
//! # Layout
//!
//! ```text
//! <root>/active-licenses/license-<FINGERPRINT>.json
//! <root>/license-history/license-<FINGERPRINT>-reactivated-<YYYYmmdd-HHMMSS>.json
//! ```
//!
//! - One pretty-printed JSON document per active record, replaced atomically
//!   (write to a temporary sibling, then rename)
//! - One history document per reactivation event, created with create-new
//!   semantics so history is never overwritten
//! - Unreadable documents are logged and returned separately when listing,
//!   so callers can count them
//! - `active-licenses/license-<FINGERPRINT>.lock` guards read-modify-write of
//!   one fingerprint across processes

mod error;
mod file_store;

pub use error::{StoreError, StoreResult};
pub use file_store::{
    FileRecordStore, ACTIVE_DIR, DEFAULT_LOCK_TIMEOUT, DEFAULT_STALE_LOCK_AGE, HISTORY_DIR,
};
