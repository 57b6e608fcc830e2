//! Client version policy.
//!
//! New activations must meet the configured minimum version. Reactivations
//! can be let through regardless of version when the policy allows older
//! reactivations. Versions below latest are accepted with a warning.

use crate::config::PolicyConfig;
use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// Compares two dot-delimited integer versions.
///
/// The shorter version is zero-padded, so `"3.2"` equals `"3.2.0"`.
///
/// # Errors
///
/// Returns [`LicenseError::InvalidVersion`] if either version has an empty or
/// non-numeric component.
pub fn try_compare_versions(a: &str, b: &str) -> LicenseResult<Ordering> {
    let a = parse_components(a)?;
    let b = parse_components(b)?;
    let len = a.len().max(b.len());

    Ok((0..len)
        .map(|i| compare_component(padded(&a, i), padded(&b, i)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal))
}

/// Compares two versions, treating a malformed version as equal.
///
/// A malformed version string must not hard-fail a whole request, so any
/// comparison error is logged and reported as [`Ordering::Equal`].
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    try_compare_versions(a, b).unwrap_or_else(|e| {
        warn!(left = a, right = b, error = %e, "Version comparison failed, treating as equal");
        Ordering::Equal
    })
}

// Components stay digit strings with leading zeros stripped, so arbitrarily
// long components compare numerically without overflow.
fn parse_components(version: &str) -> LicenseResult<Vec<&str>> {
    version
        .trim()
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(LicenseError::InvalidVersion(version.to_string()));
            }
            Ok(part.trim_start_matches('0'))
        })
        .collect()
}

// A missing component is zero, which strips to "".
fn padded<'a>(parts: &[&'a str], i: usize) -> &'a str {
    parts.get(i).copied().unwrap_or("")
}

fn compare_component(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Outcome of evaluating a client version against policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDecision {
    /// The request passes the version check.
    pub valid: bool,
    /// Client version is at or above the minimum.
    pub is_acceptable: bool,
    /// Client version is at or above the latest.
    pub is_latest: bool,
    /// Accepted, but with an advisory message.
    pub warning_only: bool,
    /// The decision was made on the reactivation path.
    pub is_reactivation: bool,
    /// Version reported by the client, if any.
    pub client_version: Option<String>,
    /// Policy minimum at decision time.
    pub minimum_version: String,
    /// Policy latest at decision time.
    pub latest_version: String,
    /// Human-readable explanation.
    pub message: String,
}

impl VersionDecision {
    /// Returns the client version, or `"unknown"` when none was declared.
    #[must_use]
    pub fn client_version_or_unknown(&self) -> &str {
        self.client_version.as_deref().unwrap_or("unknown")
    }
}

/// Evaluates a client version against `policy`.
#[must_use]
pub fn evaluate_version(
    client_version: Option<&str>,
    policy: &PolicyConfig,
    is_reactivation: bool,
) -> VersionDecision {
    let minimum = policy.minimum_version.as_str();
    let latest = policy.latest_version.as_str();
    let lenient_reactivation = is_reactivation && policy.allow_older_reactivations;

    let mut decision = VersionDecision {
        valid: false,
        is_acceptable: false,
        is_latest: false,
        warning_only: false,
        is_reactivation,
        client_version: client_version.map(str::to_string),
        minimum_version: minimum.to_string(),
        latest_version: latest.to_string(),
        message: String::new(),
    };

    let Some(version) = client_version else {
        if lenient_reactivation {
            decision.valid = true;
            decision.warning_only = true;
            decision.message =
                "Reactivation request - version not provided but allowed for existing licenses"
                    .to_string();
        } else {
            decision.message = "No software version information provided in request".to_string();
        }
        return decision;
    };

    let vs_minimum = compare_versions(version, minimum);
    let vs_latest = compare_versions(version, latest);
    decision.is_acceptable = vs_minimum.is_ge();
    decision.is_latest = vs_latest.is_ge();

    if lenient_reactivation {
        decision.valid = true;
        if decision.is_latest {
            decision.message = format!("Reactivation approved for current version {version}");
        } else {
            decision.warning_only = true;
            decision.message = format!(
                "Reactivation allowed for version {version}, \
                 but please update to {latest} for latest features"
            );
        }
        return decision;
    }

    decision.valid = decision.is_acceptable;
    if vs_minimum.is_lt() {
        decision.message = format!(
            "Version {version} is outdated. Minimum required: {minimum}. Latest: {latest}. \
             Please update software before activation."
        );
    } else if vs_latest.is_lt() {
        decision.warning_only = true;
        decision.message = format!(
            "Version {version} is acceptable but not latest. Latest version: {latest}. \
             Consider updating for new features and bug fixes."
        );
    } else {
        decision.message = format!("Version {version} is current and up to date.");
    }
    decision
}
