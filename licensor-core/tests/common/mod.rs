//! Shared test helpers for lifecycle tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use licensor_core::{HardwareFingerprint, LicenseRecord, RecordStatus, RecordTimestamp};

pub const FP: &str = "AB12CD34EF56GH78";
pub const FP2: &str = "ZZ99YY88XX77WW66";
pub const FP3: &str = "0000111122223333";

pub const NEW_TITLE: &str = "Auto-Activation Request - Acme Corp - AB12CD34EF56GH78";
pub const REACTIVATION_TITLE: &str = "Auto-Reactivation Request - Acme Corp - AB12CD34EF56GH78";

/// A fixed reference instant: 2025-03-01T12:00:00Z.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn fp(value: &str) -> HardwareFingerprint {
    HardwareFingerprint::parse(value).unwrap()
}

pub fn body(email: &str, version: Option<&str>) -> String {
    let mut body = format!("Contact: Jane Roe\nEmail: {email}\n");
    if let Some(v) = version {
        body.push_str(&format!("Software Version: {v}\n"));
    }
    body
}

/// An active record created 30 days before `expires`.
pub fn record(fingerprint: &str, expires: DateTime<Utc>, status: RecordStatus) -> LicenseRecord {
    LicenseRecord {
        license_key: format!("KEY-{fingerprint}"),
        hardware_fingerprint: fp(fingerprint),
        company_name: "Acme Corp".into(),
        contact_email: "ops@acme.com".into(),
        created_date: RecordTimestamp::from_datetime(expires - Duration::days(30)),
        expires_date: RecordTimestamp::from_datetime(expires),
        status,
        reactivation_count: 0,
        last_reactivated: None,
        version: "3.2.4".into(),
        auto_generated: true,
        reactivation_required: true,
        generated_by: "licensor".into(),
        generation_method: "automated".into(),
    }
}

pub fn active(fingerprint: &str, expires: DateTime<Utc>) -> LicenseRecord {
    record(fingerprint, expires, RecordStatus::Active)
}

pub fn with_raw_expiry(mut record: LicenseRecord, raw: &str) -> LicenseRecord {
    record.expires_date = RecordTimestamp::from_raw(raw);
    record
}
