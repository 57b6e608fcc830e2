//! Record store abstraction.
//!
//! The core never owns license records; it reads them from a [`RecordStore`]
//! and writes new state back on every decision. Stores give read-your-writes
//! consistency per fingerprint but no atomicity across concurrent writers, so
//! every read-modify-write of a record runs under [`FingerprintLocks`].

use crate::record::LicenseRecord;
use crate::request::HardwareFingerprint;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

/// Persistent storage for license records.
pub trait RecordStore: Send + Sync {
    /// Store-specific error, propagated unchanged by the core.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads every stored record. Documents that exist but cannot be decoded
    /// are returned as [`UnreadableRecord`]s instead of failing the listing.
    fn load_all(&self) -> Result<StoredRecords<Self::Error>, Self::Error>;

    /// Loads the record for one fingerprint.
    fn load_by_fingerprint(
        &self,
        fingerprint: &HardwareFingerprint,
    ) -> Result<Option<LicenseRecord>, Self::Error>;

    /// Creates or replaces the record for its fingerprint.
    fn save(&self, record: &LicenseRecord) -> Result<(), Self::Error>;

    /// Runs `f` holding a lock on `fingerprint` that every handle on the same
    /// storage respects, including handles in other processes. Stores that
    /// are only reachable from one process can rely on the default, which
    /// takes no lock.
    fn with_record_lock<T>(
        &self,
        _fingerprint: &HardwareFingerprint,
        f: impl FnOnce() -> T,
    ) -> Result<T, Self::Error> {
        Ok(f())
    }

    /// Appends a reactivation history entry. Entries are never overwritten.
    fn append_history(
        &self,
        record: &LicenseRecord,
        reactivated_at: DateTime<Utc>,
    ) -> Result<(), Self::Error>;
}

/// A stored document that exists but could not be decoded.
#[derive(Debug)]
pub struct UnreadableRecord<E> {
    /// Store-specific name of the document, such as its fingerprint or file name.
    pub id: String,
    /// Why it could not be read.
    pub error: E,
}

/// Result of a full listing.
#[derive(Debug)]
pub struct StoredRecords<E> {
    /// Every document that decoded.
    pub records: Vec<LicenseRecord>,
    /// Every document that did not.
    pub unreadable: Vec<UnreadableRecord<E>>,
}

impl<E> StoredRecords<E> {
    /// A listing in which every document decoded.
    #[must_use]
    pub fn from_records(records: Vec<LicenseRecord>) -> Self {
        Self {
            records,
            unreadable: Vec::new(),
        }
    }

    /// Number of documents found, readable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len() + self.unreadable.len()
    }

    /// Returns true if the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serializes work per hardware fingerprint.
///
/// Two reactivations applied to the same stale expiry would both extend from
/// the same base and lose one extension; holding the fingerprint's lock
/// around load, extend and save prevents that.
#[derive(Debug, Default)]
pub struct FingerprintLocks {
    locks: Mutex<HashMap<HardwareFingerprint, Arc<Mutex<()>>>>,
}

impl FingerprintLocks {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `fingerprint`.
    pub fn run_exclusive<T>(&self, fingerprint: &HardwareFingerprint, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(fingerprint.clone()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the registry and this call hold it: nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(fingerprint);
        }
        result
    }

    /// Number of fingerprints currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no fingerprint is locked or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<LicenseRecord>>,
    history: Mutex<Vec<(DateTime<Utc>, LicenseRecord)>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: Vec<LicenseRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            history: Mutex::default(),
        }
    }

    /// Returns every history entry, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<(DateTime<Utc>, LicenseRecord)> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordStore for MemoryRecordStore {
    type Error = Infallible;

    fn load_all(&self) -> Result<StoredRecords<Self::Error>, Self::Error> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(StoredRecords::from_records(records))
    }

    fn load_by_fingerprint(
        &self,
        fingerprint: &HardwareFingerprint,
    ) -> Result<Option<LicenseRecord>, Self::Error> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| &r.hardware_fingerprint == fingerprint)
            .cloned())
    }

    fn save(&self, record: &LicenseRecord) -> Result<(), Self::Error> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records
            .iter_mut()
            .find(|r| r.hardware_fingerprint == record.hardware_fingerprint)
        {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    fn append_history(
        &self,
        record: &LicenseRecord,
        reactivated_at: DateTime<Utc>,
    ) -> Result<(), Self::Error> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((reactivated_at, record.clone()));
        Ok(())
    }
}
