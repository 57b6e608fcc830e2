//! Expiry scanning.
//!
//! "Expiring" is a derived state: an active record whose expiry falls inside
//! the lookahead window. It is computed on read and never stored.

use crate::config::DEFAULT_EXPIRY_WINDOW_DAYS;
use crate::error::{LicenseResult, RecordFailure};
use crate::record::{LicenseRecord, RecordStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Where a license sits in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Active and outside the expiring window.
    Active,
    /// Active and due for reactivation.
    Expiring,
    /// Explicitly marked expired.
    Expired,
}

/// Result of scanning a batch of records.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Expiring records, in input order.
    pub expiring: Vec<LicenseRecord>,
    /// Number of records inspected.
    pub total_scanned: usize,
    /// Records skipped because they could not be decoded or their expiry
    /// could not be read.
    pub failures: Vec<RecordFailure>,
}

impl ScanReport {
    /// Number of expiring records.
    #[must_use]
    pub fn expiring_count(&self) -> usize {
        self.expiring.len()
    }

    /// Number of records skipped due to errors.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.failures.len()
    }

    /// Counts a stored document that could not be decoded as scanned and
    /// skipped.
    pub fn record_unreadable(&mut self, failure: RecordFailure) {
        self.total_scanned += 1;
        self.failures.push(failure);
    }
}

/// Partitions records by expiry proximity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryScanner {
    window: Duration,
}

impl Default for ExpiryScanner {
    fn default() -> Self {
        Self::from_days(DEFAULT_EXPIRY_WINDOW_DAYS)
    }
}

impl ExpiryScanner {
    /// Creates a scanner with the given lookahead.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Creates a scanner with a lookahead of `days`. Negative values are
    /// treated as zero.
    #[must_use]
    pub fn from_days(days: i64) -> Self {
        Self::new(Duration::try_days(days.max(0)).unwrap_or(Duration::MAX))
    }

    /// Returns the lookahead window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Classifies one record at `now`.
    ///
    /// # Errors
    ///
    /// Returns a date parse error if an active record's expiry is malformed.
    pub fn state_of(
        &self,
        record: &LicenseRecord,
        now: DateTime<Utc>,
    ) -> LicenseResult<LifecycleState> {
        if record.status == RecordStatus::Expired {
            return Ok(LifecycleState::Expired);
        }
        let expires = record.expires_at()?;
        let cutoff = now.checked_add_signed(self.window).unwrap_or(DateTime::<Utc>::MAX_UTC);
        if expires <= cutoff {
            Ok(LifecycleState::Expiring)
        } else {
            Ok(LifecycleState::Active)
        }
    }

    /// Returns true if the record is active and expires within the window.
    ///
    /// # Errors
    ///
    /// Returns a date parse error if an active record's expiry is malformed.
    pub fn is_expiring(&self, record: &LicenseRecord, now: DateTime<Utc>) -> LicenseResult<bool> {
        Ok(self.state_of(record, now)? == LifecycleState::Expiring)
    }

    /// Scans every record, collecting the expiring ones.
    ///
    /// A record with an unreadable expiry is logged, reported in
    /// [`ScanReport::failures`] and skipped; the scan always continues.
    #[must_use]
    pub fn scan(&self, records: Vec<LicenseRecord>, now: DateTime<Utc>) -> ScanReport {
        let mut report = ScanReport {
            total_scanned: records.len(),
            ..ScanReport::default()
        };

        for record in records {
            match self.is_expiring(&record, now) {
                Ok(true) => report.expiring.push(record),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        fingerprint = %record.hardware_fingerprint,
                        error = %e,
                        "Skipping license with unreadable expiry"
                    );
                    report
                        .failures
                        .push(RecordFailure::new(record.hardware_fingerprint.as_str(), e));
                }
            }
        }

        debug!(
            total = report.total_scanned,
            expiring = report.expiring_count(),
            skipped = report.skipped_count(),
            "Expiry scan complete"
        );
        report
    }
}
