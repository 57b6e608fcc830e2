mod common;

use chrono::Duration;
use common::{body, fp, t0, FP, FP2, NEW_TITLE};
use licensor_core::{
    derive_license_key, validate_request, ActivationRequest, LicenseError, LicenseIssuer,
    PolicyConfig, RecordStatus, LICENSE_KEY_LEN,
};
use proptest::prelude::*;

fn request() -> ActivationRequest {
    validate_request(NEW_TITLE, &body("ops@acme.com", Some("3.2.5"))).unwrap()
}

#[test]
fn issues_active_record_with_default_window() {
    let issuer = LicenseIssuer::new(&PolicyConfig::default());
    let record = issuer.issue(&request(), t0()).unwrap();

    assert_eq!(record.hardware_fingerprint, fp(FP));
    assert_eq!(record.company_name, "Acme Corp");
    assert_eq!(record.contact_email, "ops@acme.com");
    assert_eq!(record.status, RecordStatus::Active);
    assert_eq!(record.reactivation_count, 0);
    assert_eq!(record.last_reactivated, None);
    assert_eq!(record.created_at().unwrap(), t0());
    assert_eq!(record.expires_at().unwrap(), t0() + Duration::days(30));
    assert!(record.expires_at().unwrap() > record.created_at().unwrap());
    assert_eq!(record.version, "3.2.5");
    assert!(record.auto_generated);
    assert!(record.reactivation_required);
    assert_eq!(record.generated_by, "licensor");
    assert_eq!(record.generation_method, "automated");
}

#[test]
fn custom_duration() {
    let issuer = LicenseIssuer::new(&PolicyConfig::default());
    let record = issuer.issue_for_days(&request(), 90, t0()).unwrap();
    assert_eq!(record.expires_at().unwrap(), t0() + Duration::days(90));
}

#[test]
fn non_positive_duration_is_fatal() {
    let issuer = LicenseIssuer::new(&PolicyConfig::default());
    for days in [0, -1, -30] {
        let err = issuer.issue_for_days(&request(), days, t0()).unwrap_err();
        assert!(matches!(err, LicenseError::InvalidDuration(d) if d == days));
    }
}

#[test]
fn missing_version_records_latest() {
    let issuer = LicenseIssuer::new(&PolicyConfig::default());
    let mut req = request();
    req.software_version = None;
    let record = issuer.issue(&req, t0()).unwrap();
    assert_eq!(record.version, "3.2.4");
}

// ── Key derivation ───────────────────────────────────────────────

#[test]
fn key_shape() {
    let key = derive_license_key(&fp(FP), "Acme Corp", "ops@acme.com", t0());
    assert_eq!(key.len(), LICENSE_KEY_LEN);
    assert!(key.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn key_is_deterministic() {
    let a = derive_license_key(&fp(FP), "Acme Corp", "ops@acme.com", t0());
    let b = derive_license_key(&fp(FP), "Acme Corp", "ops@acme.com", t0());
    assert_eq!(a, b);
}

#[test]
fn key_depends_on_identity() {
    let a = derive_license_key(&fp(FP), "Acme Corp", "ops@acme.com", t0());
    let b = derive_license_key(&fp(FP2), "Acme Corp", "ops@acme.com", t0());
    let c = derive_license_key(&fp(FP), "Acme Corp", "it@acme.com", t0());
    assert_ne!(a, b);
    assert_ne!(a, c);
}

#[test]
fn reissuing_later_yields_new_key() {
    let issuer = LicenseIssuer::new(&PolicyConfig::default());
    let first = issuer.issue(&request(), t0()).unwrap();
    let second = issuer.issue(&request(), t0() + Duration::seconds(1)).unwrap();
    assert_ne!(first.license_key, second.license_key);
}

proptest! {
    #[test]
    fn differing_timestamps_never_collide(offset_micros in 1i64..10_000_000_000) {
        let a = derive_license_key(&fp(FP), "Acme Corp", "ops@acme.com", t0());
        let b = derive_license_key(
            &fp(FP),
            "Acme Corp",
            "ops@acme.com",
            t0() + Duration::microseconds(offset_micros),
        );
        prop_assert_ne!(a, b);
    }
}
