//! Reactivation: extending an expiring license.
//!
//! The new expiry is always the *current* expiry plus the extension, never
//! `now` plus the extension, so a record reactivated early is neither
//! penalized nor over-extended.

use crate::error::{LicenseError, LicenseResult, RecordFailure};
use crate::record::{LicenseRecord, RecordStatus, RecordTimestamp};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Days added to the current expiry on each reactivation.
pub const REACTIVATION_EXTENSION_DAYS: i64 = 30;

/// Result of reactivating a batch of records.
#[derive(Debug, Default)]
pub struct ReactivationReport {
    /// Updated records, in input order.
    pub reactivated: Vec<LicenseRecord>,
    /// Records that could not be reactivated.
    pub failures: Vec<RecordFailure>,
    /// Records found already moved out of the expiring window by another
    /// writer by the time they were re-read.
    pub skipped: usize,
}

impl ReactivationReport {
    /// Number of records processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.reactivated.len() + self.failures.len() + self.skipped
    }

    /// Number of successful reactivations.
    #[must_use]
    pub fn reactivated_count(&self) -> usize {
        self.reactivated.len()
    }

    /// Number of failed reactivations.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Extends one record by [`REACTIVATION_EXTENSION_DAYS`].
///
/// # Errors
///
/// Returns a date parse error if the stored expiry is malformed.
pub fn reactivate(record: &LicenseRecord, now: DateTime<Utc>) -> LicenseResult<LicenseRecord> {
    let current = record.expires_at()?;
    let new_expiry = current
        .checked_add_signed(Duration::days(REACTIVATION_EXTENSION_DAYS))
        .ok_or_else(|| LicenseError::DateParse {
            fingerprint: record.hardware_fingerprint.to_string(),
            value: record.expires_date.to_string(),
            reason: "expiry out of range after extension".to_string(),
        })?;

    let mut updated = record.clone();
    updated.expires_date = RecordTimestamp::from_datetime(new_expiry);
    updated.last_reactivated = Some(RecordTimestamp::from_datetime(now));
    updated.reactivation_count = record.reactivation_count.saturating_add(1);
    updated.status = RecordStatus::Active;

    info!(
        fingerprint = %record.hardware_fingerprint,
        company = %record.company_name,
        new_expiry = %updated.expires_date,
        count = updated.reactivation_count,
        "Reactivated license"
    );
    Ok(updated)
}

/// Reactivates every record independently.
///
/// Failures are logged and collected; they never stop the batch.
#[must_use]
pub fn reactivate_batch(records: &[LicenseRecord], now: DateTime<Utc>) -> ReactivationReport {
    let mut report = ReactivationReport::default();
    for record in records {
        match reactivate(record, now) {
            Ok(updated) => report.reactivated.push(updated),
            Err(e) => {
                warn!(
                    fingerprint = %record.hardware_fingerprint,
                    error = %e,
                    "Failed to reactivate license"
                );
                report
                    .failures
                    .push(RecordFailure::new(record.hardware_fingerprint.as_str(), e));
            }
        }
    }
    report
}
