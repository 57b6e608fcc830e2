//! End-to-end request handling.
//!
//! The orchestrator is the only place that knows about request routing:
//! raw request → validation → version policy → issuance (new) or
//! reactivation (existing) → persisted record. Version policy is evaluated
//! the same way on both routes.
//!
//! # State machine
//!
//! ```text
//! Active --(inside window)--> Expiring --(reactivated)--> Active
//!                             Expiring --(not reactivated)--> Expired (marked externally)
//! ```

use crate::clock::Clock;
use crate::config::PolicyConfig;
use crate::error::{LicenseError, LicenseResult, RecordFailure};
use crate::expiry::{ExpiryScanner, LifecycleState, ScanReport};
use crate::issuer::LicenseIssuer;
use crate::reactivation::{reactivate, ReactivationReport};
use crate::record::LicenseRecord;
use crate::request::{
    extract_version, validate_request, ActivationRequest, HardwareFingerprint, RequestKind,
};
use crate::store::{FingerprintLocks, RecordStore};
use crate::version::{evaluate_version, VersionDecision};
use tracing::{debug, info, warn};

/// Terminal outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleDecision {
    /// The request was granted and the resulting record persisted.
    Accepted {
        /// Route the request took.
        kind: RequestKind,
        /// The issued or reactivated record.
        record: LicenseRecord,
        /// Version policy outcome (may carry a warning).
        version: VersionDecision,
    },
    /// The request was refused. Nothing was written.
    Rejected {
        /// Route the request would have taken.
        kind: RequestKind,
        /// Every reason for refusal.
        errors: Vec<String>,
        /// Version policy outcome.
        version: VersionDecision,
    },
}

impl LifecycleDecision {
    /// Returns true if the request was granted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Returns the persisted record of an accepted request.
    #[must_use]
    pub fn record(&self) -> Option<&LicenseRecord> {
        match self {
            Self::Accepted { record, .. } => Some(record),
            Self::Rejected { .. } => None,
        }
    }

    /// Returns the refusal reasons (empty when accepted).
    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Accepted { .. } => &[],
            Self::Rejected { errors, .. } => errors,
        }
    }

    /// Returns the route the request took.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Accepted { kind, .. } | Self::Rejected { kind, .. } => *kind,
        }
    }

    /// Returns the version policy outcome.
    #[must_use]
    pub fn version(&self) -> &VersionDecision {
        match self {
            Self::Accepted { version, .. } | Self::Rejected { version, .. } => version,
        }
    }
}

/// Composes validation, version policy, issuance, scanning and reactivation
/// over a record store.
pub struct LifecycleOrchestrator<S, C> {
    store: S,
    clock: C,
    policy: PolicyConfig,
    issuer: LicenseIssuer,
    scanner: ExpiryScanner,
    locks: FingerprintLocks,
}

impl<S: RecordStore, C: Clock> LifecycleOrchestrator<S, C> {
    /// Creates an orchestrator over `store` using `policy` and `clock`.
    pub fn new(store: S, clock: C, policy: PolicyConfig) -> Self {
        Self {
            store,
            clock,
            issuer: LicenseIssuer::new(&policy),
            scanner: ExpiryScanner::from_days(policy.expiry_window_days),
            policy,
            locks: FingerprintLocks::new(),
        }
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the expiry scanner built from the policy window.
    pub fn scanner(&self) -> &ExpiryScanner {
        &self.scanner
    }

    /// Validates a raw request and, if it passes, issues or reactivates.
    ///
    /// Validation errors and a failed version check are reported together.
    ///
    /// # Errors
    ///
    /// Store failures are propagated unchanged; a non-positive configured
    /// duration fails issuance.
    pub fn handle_request(&self, title: &str, body: &str) -> LicenseResult<LifecycleDecision> {
        let kind = RequestKind::detect(title, body);
        let version = evaluate_version(
            extract_version(body).as_deref(),
            &self.policy,
            kind.is_reactivation(),
        );
        debug!(kind = kind.as_str(), version_valid = version.valid, "Routing request");

        let mut errors = Vec::new();
        let validated = validate_request(title, body);
        if let Err(invalid) = &validated {
            errors.extend(invalid.iter().map(ToString::to_string));
        }
        if !version.valid {
            if self.policy.enforce_version_check {
                errors.push(version.message.clone());
            } else {
                warn!(message = %version.message, "Version check failed but enforcement is off");
            }
        }

        let request = match validated {
            Ok(request) if errors.is_empty() => request,
            _ => {
                info!(kind = kind.as_str(), errors = errors.len(), "Request rejected");
                return Ok(LifecycleDecision::Rejected { kind, errors, version });
            }
        };

        match kind {
            RequestKind::NewActivation => {
                let record = self.issue(&request)?;
                Ok(LifecycleDecision::Accepted { kind, record, version })
            }
            RequestKind::Reactivation => self.reactivate_request(&request, version),
        }
    }

    /// Issues a license for a validated request and saves it.
    ///
    /// An existing record for the same fingerprint is replaced (re-issuance).
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidDuration`] for a non-positive configured
    /// duration, or the store's error.
    pub fn issue(&self, request: &ActivationRequest) -> LicenseResult<LicenseRecord> {
        self.issue_for_days(request, self.policy.default_duration_days)
    }

    /// Issues a license valid for `duration_days` and saves it.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidDuration`] for a non-positive duration,
    /// or the store's error.
    pub fn issue_for_days(
        &self,
        request: &ActivationRequest,
        duration_days: i64,
    ) -> LicenseResult<LicenseRecord> {
        self.exclusive(&request.fingerprint, || -> LicenseResult<LicenseRecord> {
            let previous = self
                .store
                .load_by_fingerprint(&request.fingerprint)
                .map_err(LicenseError::storage)?;
            if let Some(previous) = previous {
                info!(
                    fingerprint = %request.fingerprint,
                    previous_key = %previous.license_key,
                    "Re-issuing license"
                );
            }
            let record = self
                .issuer
                .issue_for_days(request, duration_days, self.clock.now())?;
            self.store.save(&record).map_err(LicenseError::storage)?;
            Ok(record)
        })
    }

    fn reactivate_request(
        &self,
        request: &ActivationRequest,
        version: VersionDecision,
    ) -> LicenseResult<LifecycleDecision> {
        let fingerprint = &request.fingerprint;
        let kind = RequestKind::Reactivation;

        self.exclusive(fingerprint, || -> LicenseResult<LifecycleDecision> {
            let rejected = |reason: String| -> LicenseResult<LifecycleDecision> {
                info!(fingerprint = %fingerprint, reason = %reason, "Reactivation rejected");
                Ok(LifecycleDecision::Rejected {
                    kind,
                    errors: vec![reason],
                    version: version.clone(),
                })
            };

            let Some(current) = self
                .store
                .load_by_fingerprint(fingerprint)
                .map_err(LicenseError::storage)?
            else {
                return rejected(format!(
                    "No license on record for hardware fingerprint {fingerprint}"
                ));
            };

            let now = self.clock.now();
            match self.scanner.state_of(&current, now) {
                Ok(LifecycleState::Expiring) => {}
                Ok(LifecycleState::Expired) => {
                    return rejected(format!(
                        "License for {fingerprint} has expired; submit a new activation request"
                    ));
                }
                Ok(LifecycleState::Active) => {
                    return rejected(format!(
                        "License for {fingerprint} is not yet eligible for reactivation \
                         (expires {})",
                        current.expires_date
                    ));
                }
                Err(e) => return rejected(e.to_string()),
            }

            let record = match reactivate(&current, now) {
                Ok(record) => record,
                Err(e) => return rejected(e.to_string()),
            };
            self.persist_reactivation(&record, now)?;
            Ok(LifecycleDecision::Accepted {
                kind,
                record,
                version: version.clone(),
            })
        })
    }

    /// Scans every stored record for licenses inside the expiring window.
    ///
    /// # Errors
    ///
    /// Returns the store's error if records cannot be listed.
    pub fn scan_expiring(&self) -> LicenseResult<ScanReport> {
        let stored = self.store.load_all().map_err(LicenseError::storage)?;
        let mut report = self.scanner.scan(stored.records, self.clock.now());
        for unreadable in stored.unreadable {
            report.record_unreadable(RecordFailure::new(
                unreadable.id,
                LicenseError::storage(unreadable.error),
            ));
        }
        info!(
            total = report.total_scanned,
            expiring = report.expiring_count(),
            skipped = report.skipped_count(),
            "Scanned licenses"
        );
        Ok(report)
    }

    /// Reactivates every expiring license and persists each one.
    ///
    /// Each record is re-read under its fingerprint lock before extension. A
    /// record that a concurrent writer already moved out of the window is
    /// counted as skipped. Per-record failures, storage included, are
    /// collected and never stop the batch.
    ///
    /// # Errors
    ///
    /// Returns the store's error only if the initial listing fails.
    pub fn reactivate_expiring(&self) -> LicenseResult<ReactivationReport> {
        let scan = self.scan_expiring()?;
        let mut report = ReactivationReport::default();

        for candidate in &scan.expiring {
            let fingerprint = &candidate.hardware_fingerprint;
            match self.reactivate_if_expiring(fingerprint) {
                Ok(Some(record)) => report.reactivated.push(record),
                Ok(None) => {
                    debug!(fingerprint = %fingerprint, "License no longer expiring, skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(fingerprint = %fingerprint, error = %e, "Failed to reactivate license");
                    report
                        .failures
                        .push(RecordFailure::new(fingerprint.as_str(), e));
                }
            }
        }

        info!(
            expiring = scan.expiring_count(),
            reactivated = report.reactivated_count(),
            failed = report.failed_count(),
            "Reactivation run complete"
        );
        Ok(report)
    }

    /// Marks a license expired. Returns the updated record, or `None` if no
    /// license exists for the fingerprint.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub fn mark_expired(
        &self,
        fingerprint: &HardwareFingerprint,
    ) -> LicenseResult<Option<LicenseRecord>> {
        self.exclusive(fingerprint, || -> LicenseResult<Option<LicenseRecord>> {
            let Some(current) = self
                .store
                .load_by_fingerprint(fingerprint)
                .map_err(LicenseError::storage)?
            else {
                return Ok(None);
            };
            let expired = current.into_expired();
            self.store.save(&expired).map_err(LicenseError::storage)?;
            info!(fingerprint = %fingerprint, "License marked expired");
            Ok(Some(expired))
        })
    }

    /// Returns the lifecycle state of a stored license at the current time.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or a date parse error for a malformed expiry.
    pub fn state_of(
        &self,
        fingerprint: &HardwareFingerprint,
    ) -> LicenseResult<Option<LifecycleState>> {
        let record = self
            .store
            .load_by_fingerprint(fingerprint)
            .map_err(LicenseError::storage)?;
        record
            .map(|r| self.scanner.state_of(&r, self.clock.now()))
            .transpose()
    }

    // Re-reads under the lock; `None` when the record is gone or no longer
    // inside the window.
    fn reactivate_if_expiring(
        &self,
        fingerprint: &HardwareFingerprint,
    ) -> LicenseResult<Option<LicenseRecord>> {
        self.exclusive(fingerprint, || -> LicenseResult<Option<LicenseRecord>> {
            let now = self.clock.now();
            let Some(current) = self
                .store
                .load_by_fingerprint(fingerprint)
                .map_err(LicenseError::storage)?
            else {
                return Ok(None);
            };
            if !self.scanner.is_expiring(&current, now)? {
                return Ok(None);
            }
            let record = reactivate(&current, now)?;
            self.persist_reactivation(&record, now)?;
            Ok(Some(record))
        })
    }

    // In-process lock first, then the store's own lock for other processes.
    fn exclusive<T>(
        &self,
        fingerprint: &HardwareFingerprint,
        f: impl FnOnce() -> LicenseResult<T>,
    ) -> LicenseResult<T> {
        self.locks.run_exclusive(fingerprint, || -> LicenseResult<T> {
            self.store
                .with_record_lock(fingerprint, f)
                .map_err(LicenseError::storage)?
        })
    }

    fn persist_reactivation(
        &self,
        record: &LicenseRecord,
        now: chrono::DateTime<chrono::Utc>,
    ) -> LicenseResult<()> {
        self.store.save(record).map_err(LicenseError::storage)?;
        self.store
            .append_history(record, now)
            .map_err(LicenseError::storage)
    }
}
