//! Structured decision output for the invoking automation.
//!
//! A [`Report`] is an ordered list of key/value fields. The field names are
//! the contract with downstream tooling; how they are transported is up to
//! the [`ReportSink`].

use crate::error::{LicenseError, LicenseResult};
use crate::expiry::ScanReport;
use crate::lifecycle::LifecycleDecision;
use crate::reactivation::ReactivationReport;
use crate::record::LicenseRecord;
use crate::request::{ActivationRequest, RequestKind, ValidationError};
use crate::version::VersionDecision;
use std::fmt::{self, Display};

/// Ordered key/value decision output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    fields: Vec<(String, String)>,
}

impl Report {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an earlier value for the same key.
    pub fn set(&mut self, key: &str, value: impl Display) -> &mut Self {
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
        self
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Appends every field of `other`.
    pub fn merge(&mut self, other: &Report) -> &mut Self {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
        self
    }

    /// Report for a request validation outcome.
    #[must_use]
    pub fn validation(outcome: &Result<ActivationRequest, Vec<ValidationError>>) -> Self {
        let mut report = Self::new();
        match outcome {
            Ok(request) => {
                report
                    .set("valid", true)
                    .set("fingerprint", &request.fingerprint)
                    .set("company", &request.company)
                    .set("email", &request.email)
                    .set("name", request.contact_name.as_deref().unwrap_or(""))
                    .set("request_kind", request.kind.as_str());
            }
            Err(errors) => {
                let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
                report.set("valid", false).set("errors", json_list(&errors));
            }
        }
        report
    }

    /// Report for a version policy decision.
    #[must_use]
    pub fn version(decision: &VersionDecision) -> Self {
        let mut report = Self::new();
        report
            .set("version_valid", decision.valid)
            .set("client_version", decision.client_version_or_unknown())
            .set("is_latest", decision.is_latest)
            .set("is_acceptable", decision.is_acceptable)
            .set("version_message", &decision.message)
            .set("warning_only", decision.warning_only);
        report
    }

    /// Report for an issued or reactivated record.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] if the record cannot be
    /// encoded as `license_data`.
    pub fn record(record: &LicenseRecord) -> LicenseResult<Self> {
        let mut report = Self::new();
        report
            .set("license_key", &record.license_key)
            .set("expires_date", &record.expires_date)
            .set("license_data", serde_json::to_string(record)?);
        Ok(report)
    }

    /// Report for a full lifecycle decision.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] if an accepted record cannot be
    /// encoded.
    pub fn decision(decision: &LifecycleDecision) -> LicenseResult<Self> {
        let mut report = Self::new();
        report
            .set(
                "decision",
                if decision.is_accepted() { "accepted" } else { "rejected" },
            )
            .set("valid", decision.is_accepted())
            .set("request_kind", decision.kind().as_str());
        report.merge(&Self::version(decision.version()));
        match decision {
            LifecycleDecision::Accepted { record, kind, .. } => {
                report.merge(&Self::record(record)?);
                if *kind == RequestKind::Reactivation {
                    report.set("reactivation_count", record.reactivation_count);
                }
            }
            LifecycleDecision::Rejected { errors, .. } => {
                report.set("errors", json_list(errors));
            }
        }
        Ok(report)
    }

    /// Report for an expiry scan.
    #[must_use]
    pub fn scan(scan: &ScanReport) -> Self {
        let mut report = Self::new();
        report
            .set("total_licenses", scan.total_scanned)
            .set("expiring_count", scan.expiring_count())
            .set("skipped_count", scan.skipped_count());
        report
    }

    /// Report for a reactivation run.
    #[must_use]
    pub fn reactivation(run: &ReactivationReport) -> Self {
        let mut report = Self::new();
        report
            .set("reactivated_count", run.reactivated_count())
            .set("total_expiring", run.total())
            .set("failed_count", run.failed_count());
        report
    }
}

impl Display for Report {
    /// Renders `key=value` lines. Newlines inside values are flattened so
    /// each field stays on one line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.fields {
            writeln!(f, "{k}={}", v.replace(['\r', '\n'], " "))?;
        }
        Ok(())
    }
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Destination for decision reports.
pub trait ReportSink {
    /// Delivers one report.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the report cannot be delivered.
    fn emit(&mut self, report: &Report) -> std::io::Result<()>;
}

/// Collects reports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Every report emitted so far.
    pub reports: Vec<Report>,
}

impl ReportSink for MemorySink {
    fn emit(&mut self, report: &Report) -> std::io::Result<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}
