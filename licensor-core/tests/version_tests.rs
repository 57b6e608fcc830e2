mod common;

use common::{body, NEW_TITLE, REACTIVATION_TITLE};
use licensor_core::{
    compare_versions, evaluate_version, extract_version, try_compare_versions, PolicyConfig,
    RequestKind,
};
use proptest::prelude::*;
use std::cmp::Ordering;

fn policy(minimum: &str, latest: &str) -> PolicyConfig {
    PolicyConfig {
        minimum_version: minimum.into(),
        latest_version: latest.into(),
        ..PolicyConfig::default()
    }
}

// ── Comparison ───────────────────────────────────────────────────

#[test]
fn zero_padding_law() {
    assert_eq!(compare_versions("3.2.0", "3.2"), Ordering::Equal);
    assert_eq!(compare_versions("3.2", "3.2.0.0"), Ordering::Equal);
}

#[test]
fn component_wise_ordering() {
    assert_eq!(compare_versions("3.3.0", "3.2.9"), Ordering::Greater);
    assert_eq!(compare_versions("3.2.4", "3.2.10"), Ordering::Less);
    assert_eq!(compare_versions("4", "3.99.99"), Ordering::Greater);
}

#[test]
fn oversized_components_compare_numerically() {
    assert_eq!(
        compare_versions("3.99999999999999999999.0", "4.0.0"),
        Ordering::Less
    );
    assert_eq!(
        compare_versions("3.100000000000000000000", "3.99999999999999999999"),
        Ordering::Greater
    );
    assert_eq!(compare_versions("3.0002.1", "3.2.1"), Ordering::Equal);
}

#[test]
fn oversized_outdated_version_is_rejected() {
    let decision = evaluate_version(
        Some("3.99999999999999999999.0"),
        &policy("4.0.0", "4.0.0"),
        false,
    );
    assert!(!decision.valid);
    assert!(!decision.is_acceptable);
    assert!(!decision.is_latest);
    assert!(decision.message.contains("is outdated"));
}

#[test]
fn malformed_version_falls_back_to_equal() {
    assert_eq!(compare_versions("3.beta", "3.2.4"), Ordering::Equal);
    assert_eq!(compare_versions("3.2.4", ""), Ordering::Equal);
    assert!(try_compare_versions("3.beta", "3.2.4").is_err());
    assert!(try_compare_versions("3.+2", "3.2").is_err());
}

fn version_strategy(len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..50, len).prop_map(|parts| {
        parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    })
}

fn version_pair() -> impl Strategy<Value = (String, String)> {
    (1usize..5).prop_flat_map(|len| (version_strategy(len), version_strategy(len)))
}

proptest! {
    #[test]
    fn comparison_is_antisymmetric((a, b) in version_pair()) {
        prop_assert_eq!(compare_versions(&a, &b), compare_versions(&b, &a).reverse());
    }

    #[test]
    fn comparison_is_reflexive(a in (1usize..5).prop_flat_map(version_strategy)) {
        prop_assert_eq!(compare_versions(&a, &a), Ordering::Equal);
    }

    #[test]
    fn trailing_zeros_never_matter(a in (1usize..5).prop_flat_map(version_strategy)) {
        let padded = format!("{a}.0.0");
        prop_assert_eq!(compare_versions(&a, &padded), Ordering::Equal);
    }
}

// ── Policy: new activations ──────────────────────────────────────

#[test]
fn new_activation_above_latest_is_clean() {
    // Scenario: client 3.2.5 with latest 3.2.4.
    let body = body("ops@acme.com", Some("3.2.5"));
    let kind = RequestKind::detect(NEW_TITLE, &body);
    let decision = evaluate_version(
        extract_version(&body).as_deref(),
        &PolicyConfig::default(),
        kind.is_reactivation(),
    );
    assert!(decision.valid);
    assert!(decision.is_acceptable);
    assert!(decision.is_latest);
    assert!(!decision.warning_only);
    assert_eq!(decision.message, "Version 3.2.5 is current and up to date.");
}

#[test]
fn new_activation_below_minimum_is_rejected() {
    let decision = evaluate_version(Some("3.0.0"), &PolicyConfig::default(), false);
    assert!(!decision.valid);
    assert!(!decision.is_acceptable);
    assert!(!decision.warning_only);
    assert!(decision.message.contains("3.0.0"));
    assert!(decision.message.contains("Minimum required: 3.2.4"));
    assert!(decision.message.contains("Latest: 3.2.4"));
}

#[test]
fn new_activation_between_minimum_and_latest_warns() {
    let decision = evaluate_version(Some("3.1.0"), &policy("3.0.0", "3.2.4"), false);
    assert!(decision.valid);
    assert!(decision.is_acceptable);
    assert!(!decision.is_latest);
    assert!(decision.warning_only);
    assert!(decision.message.contains("acceptable but not latest"));
    assert!(decision.message.contains("3.2.4"));
}

#[test]
fn branch_messages_read_as_one_line() {
    let outdated = evaluate_version(Some("3.0.0"), &policy("3.1.0", "3.2.4"), false);
    assert_eq!(
        outdated.message,
        "Version 3.0.0 is outdated. Minimum required: 3.1.0. Latest: 3.2.4. Please update software before activation."
    );

    let behind = evaluate_version(Some("3.1.0"), &policy("3.0.0", "3.2.4"), false);
    assert_eq!(
        behind.message,
        "Version 3.1.0 is acceptable but not latest. Latest version: 3.2.4. Consider updating for new features and bug fixes."
    );

    let reactivation = evaluate_version(Some("3.1.0"), &policy("3.0.0", "3.2.4"), true);
    assert_eq!(
        reactivation.message,
        "Reactivation allowed for version 3.1.0, but please update to 3.2.4 for latest features"
    );
}

#[test]
fn new_activation_without_version_is_rejected() {
    let decision = evaluate_version(None, &PolicyConfig::default(), false);
    assert!(!decision.valid);
    assert_eq!(decision.client_version_or_unknown(), "unknown");
    assert_eq!(decision.message, "No software version information provided in request");
}

// ── Policy: reactivations ────────────────────────────────────────

#[test]
fn reactivation_without_version_is_allowed_with_warning() {
    let body = body("ops@acme.com", None);
    let kind = RequestKind::detect(REACTIVATION_TITLE, &body);
    let decision = evaluate_version(
        extract_version(&body).as_deref(),
        &PolicyConfig::default(),
        kind.is_reactivation(),
    );
    assert!(decision.valid);
    assert!(decision.warning_only);
    assert!(decision.is_reactivation);
    assert!(decision.message.contains("version not provided but allowed"));
}

#[test]
fn reactivation_never_fails_on_old_version() {
    let decision = evaluate_version(Some("1.0.0"), &PolicyConfig::default(), true);
    assert!(decision.valid);
    assert!(!decision.is_acceptable);
    assert!(decision.warning_only);
    assert!(decision.message.contains("1.0.0"));
    assert!(decision.message.contains("update to 3.2.4"));
}

#[test]
fn reactivation_on_latest_has_no_warning() {
    let decision = evaluate_version(Some("3.2.4"), &PolicyConfig::default(), true);
    assert!(decision.valid);
    assert!(!decision.warning_only);
    assert_eq!(decision.message, "Reactivation approved for current version 3.2.4");
}

#[test]
fn strict_reactivations_follow_new_activation_rules() {
    let strict = PolicyConfig {
        allow_older_reactivations: false,
        ..PolicyConfig::default()
    };
    assert!(!evaluate_version(Some("3.0.0"), &strict, true).valid);
    assert!(!evaluate_version(None, &strict, true).valid);
    assert!(evaluate_version(Some("3.2.4"), &strict, true).valid);
}
