//! License issuance and key derivation.

use crate::config::PolicyConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::record::{LicenseRecord, RecordStatus, RecordTimestamp};
use crate::request::{ActivationRequest, HardwareFingerprint};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::info;

/// Length of a derived license key.
pub const LICENSE_KEY_LEN: usize = 32;

/// Derives a license key from identity and issuance time.
///
/// The key is the upper-cased first 32 hex characters of
/// `SHA-256("<fingerprint>:<company>:<email>:<issued_at>")`. It identifies a
/// license; it does not prove anything about one.
#[must_use]
pub fn derive_license_key(
    fingerprint: &HardwareFingerprint,
    company: &str,
    email: &str,
    issued_at: DateTime<Utc>,
) -> String {
    let material = format!(
        "{fingerprint}:{company}:{email}:{}",
        issued_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    let digest = Sha256::digest(material.as_bytes());
    let mut key = hex::encode_upper(digest);
    key.truncate(LICENSE_KEY_LEN);
    key
}

/// Builds new license records.
#[derive(Debug, Clone)]
pub struct LicenseIssuer {
    default_duration_days: i64,
    latest_version: String,
    generated_by: String,
}

impl LicenseIssuer {
    /// Creates an issuer using the duration and metadata from `policy`.
    #[must_use]
    pub fn new(policy: &PolicyConfig) -> Self {
        Self {
            default_duration_days: policy.default_duration_days,
            latest_version: policy.latest_version.clone(),
            generated_by: policy.generated_by.clone(),
        }
    }

    /// Issues a license valid for the configured default duration.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidDuration`] if the configured duration is
    /// not positive.
    pub fn issue(
        &self,
        request: &ActivationRequest,
        now: DateTime<Utc>,
    ) -> LicenseResult<LicenseRecord> {
        self.issue_for_days(request, self.default_duration_days, now)
    }

    /// Issues a license valid for `duration_days` from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidDuration`] if `duration_days` is not
    /// positive.
    pub fn issue_for_days(
        &self,
        request: &ActivationRequest,
        duration_days: i64,
        now: DateTime<Utc>,
    ) -> LicenseResult<LicenseRecord> {
        if duration_days <= 0 {
            return Err(LicenseError::InvalidDuration(duration_days));
        }
        let expires = Duration::try_days(duration_days)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(LicenseError::InvalidDuration(duration_days))?;

        let license_key =
            derive_license_key(&request.fingerprint, &request.company, &request.email, now);

        info!(
            fingerprint = %request.fingerprint,
            company = %request.company,
            expires = %expires,
            "Issued license"
        );

        Ok(LicenseRecord {
            license_key,
            hardware_fingerprint: request.fingerprint.clone(),
            company_name: request.company.clone(),
            contact_email: request.email.clone(),
            created_date: RecordTimestamp::from_datetime(now),
            expires_date: RecordTimestamp::from_datetime(expires),
            status: RecordStatus::Active,
            reactivation_count: 0,
            last_reactivated: None,
            version: request
                .software_version
                .clone()
                .unwrap_or_else(|| self.latest_version.clone()),
            auto_generated: true,
            reactivation_required: true,
            generated_by: self.generated_by.clone(),
            generation_method: "automated".to_string(),
        })
    }
}
