//! The persisted license record.

use crate::error::{LicenseError, LicenseResult};
use crate::request::HardwareFingerprint;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored status of a license. "Expiring" is derived and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Not explicitly marked expired.
    Active,
    /// Explicitly marked expired. Terminal.
    Expired,
}

impl RecordStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

/// A timestamp kept exactly as stored and parsed on use.
///
/// Stored records may carry timestamps written by older tooling, so a bad
/// value must not make the whole record unreadable. Parsing accepts RFC 3339
/// and naive ISO-8601 (read as UTC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordTimestamp(String);

impl RecordTimestamp {
    /// Formats `at` as RFC 3339 UTC.
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Wraps a raw stored value without validating it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the stored text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the stored text.
    ///
    /// # Errors
    ///
    /// Returns the parser diagnostic if neither RFC 3339 nor naive ISO-8601
    /// matches.
    pub fn parse(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        let raw = self.0.trim();
        match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => Ok(at.with_timezone(&Utc)),
            Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| rfc_err),
        }
    }
}

impl From<DateTime<Utc>> for RecordTimestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(at)
    }
}

impl fmt::Display for RecordTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_generation_method() -> String {
    "automated".to_string()
}

/// One issued license, keyed by hardware fingerprint.
///
/// Field names match the stored JSON documents; timestamps are kept as
/// stored and parsed through [`LicenseRecord::expires_at`] and friends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Opaque identifier, fixed at issuance.
    pub license_key: String,
    /// Primary lookup key.
    pub hardware_fingerprint: HardwareFingerprint,
    /// Organization the license was issued to.
    pub company_name: String,
    /// Contact address for the license.
    pub contact_email: String,
    /// Issuance time.
    pub created_date: RecordTimestamp,
    /// End of the validity window; advanced on reactivation.
    pub expires_date: RecordTimestamp,
    /// Stored status.
    pub status: RecordStatus,
    /// Number of successful reactivations.
    #[serde(default)]
    pub reactivation_count: u32,
    /// Time of the latest reactivation.
    #[serde(default)]
    pub last_reactivated: Option<RecordTimestamp>,
    /// Client version the license was issued for.
    #[serde(default)]
    pub version: String,
    /// Issued by automation rather than by hand.
    #[serde(default)]
    pub auto_generated: bool,
    /// The license must be reactivated before it lapses.
    #[serde(default)]
    pub reactivation_required: bool,
    /// Issuing system.
    #[serde(default)]
    pub generated_by: String,
    /// How the license was produced.
    #[serde(default = "default_generation_method")]
    pub generation_method: String,
}

impl LicenseRecord {
    /// Parses `expires_date`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::DateParse`] if the stored value is malformed.
    pub fn expires_at(&self) -> LicenseResult<DateTime<Utc>> {
        self.parse_timestamp(&self.expires_date)
    }

    /// Parses `created_date`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::DateParse`] if the stored value is malformed.
    pub fn created_at(&self) -> LicenseResult<DateTime<Utc>> {
        self.parse_timestamp(&self.created_date)
    }

    /// Returns true if the record is stored as active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Returns a copy of this record marked expired.
    #[must_use]
    pub fn into_expired(mut self) -> Self {
        self.status = RecordStatus::Expired;
        self
    }

    fn parse_timestamp(&self, stamp: &RecordTimestamp) -> LicenseResult<DateTime<Utc>> {
        stamp.parse().map_err(|e| LicenseError::DateParse {
            fingerprint: self.hardware_fingerprint.to_string(),
            value: stamp.as_str().to_string(),
            reason: e.to_string(),
        })
    }
}
