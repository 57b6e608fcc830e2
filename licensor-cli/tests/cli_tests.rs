use chrono::{Duration, TimeZone, Utc};
use clap::Parser;
use licensor_cli::{execute, Cli, Command, Outcome};
use licensor_core::{Clock, FixedClock, LicenseRecord, MemorySink, Report};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const FP: &str = "AB12CD34EF56GH78";
const NEW_TITLE: &str = "Auto-Activation Request - Acme Corp - AB12CD34EF56GH78";
const REACTIVATION_TITLE: &str = "Auto-Reactivation Request - Acme Corp - AB12CD34EF56GH78";
const BODY: &str = "Contact: Jane Roe\nEmail: ops@acme.com\nSoftware Version: 3.2.4\n";

struct Harness {
    dir: TempDir,
    clock: Arc<FixedClock>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            clock: Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            )),
        }
    }

    fn cli(&self, args: &[&str]) -> Cli {
        let data = self.dir.path().join("data");
        let config = self.dir.path().join("activation-config.json");
        let mut argv = vec![
            "licensor".to_string(),
            "--data-dir".to_string(),
            data.display().to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ];
        argv.extend(args.iter().map(ToString::to_string));
        Cli::parse_from(argv)
    }

    fn run(&self, args: &[&str]) -> (Outcome, Report) {
        let cli = self.cli(args);
        let mut sink = MemorySink::default();
        let outcome = execute(&cli, Arc::clone(&self.clock), &mut sink).unwrap();
        assert_eq!(sink.reports.len(), 1);
        (outcome, sink.reports.remove(0))
    }

    fn write_config(&self, json: &str) {
        std::fs::write(self.dir.path().join("activation-config.json"), json).unwrap();
    }

    fn active_file(&self) -> std::path::PathBuf {
        self.dir
            .path()
            .join("data")
            .join("active-licenses")
            .join(format!("license-{FP}.json"))
    }
}

fn read_record(path: &Path) -> LicenseRecord {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ── Argument parsing ─────────────────────────────────────────────

#[test]
fn global_flags_are_accepted_after_the_subcommand() {
    let cli = Cli::parse_from([
        "licensor",
        "expire",
        "--fingerprint",
        FP,
        "--output",
        "/tmp/out",
        "-v",
    ]);
    assert!(cli.verbose);
    assert_eq!(cli.output.as_deref(), Some(Path::new("/tmp/out")));
    assert!(matches!(cli.command, Command::Expire { .. }));
}

// ── validate / check-version ─────────────────────────────────────

#[test]
fn validate_reports_request_fields() {
    let h = Harness::new();
    let (outcome, report) = h.run(&["validate", "--title", NEW_TITLE, "--body", BODY]);

    assert_eq!(outcome, Outcome::Accepted);
    assert_eq!(report.get("valid"), Some("true"));
    assert_eq!(report.get("fingerprint"), Some(FP));
    assert_eq!(report.get("company"), Some("Acme Corp"));
    assert_eq!(report.get("name"), Some("Jane Roe"));
    assert_eq!(report.get("request_kind"), Some("new_activation"));
    assert!(!h.active_file().exists());
}

#[test]
fn validate_rejects_with_every_error() {
    let h = Harness::new();
    let (outcome, report) = h.run(&["validate", "--title", "Activation Request", "--body", "Email: nope"]);

    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(report.get("valid"), Some("false"));
    assert_eq!(
        report.get("errors"),
        Some(r#"["Hardware fingerprint not found","Company name not found","Invalid email format"]"#)
    );
}

#[test]
fn outdated_version_fails_the_check() {
    let h = Harness::new();
    let (outcome, report) = h.run(&[
        "check-version",
        "--title",
        NEW_TITLE,
        "--body",
        "Software Version: 3.0.0",
    ]);

    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(report.get("version_valid"), Some("false"));
    assert_eq!(report.get("client_version"), Some("3.0.0"));
}

#[test]
fn disabled_enforcement_passes_an_outdated_version() {
    let h = Harness::new();
    h.write_config(r#"{"activation_settings": {"enforce_version_check": false}}"#);
    let (outcome, report) = h.run(&[
        "check-version",
        "--title",
        NEW_TITLE,
        "--body",
        "Software Version: 3.0.0",
    ]);

    assert_eq!(outcome, Outcome::Accepted);
    assert_eq!(report.get("version_valid"), Some("false"));
}

// ── issue / expire ───────────────────────────────────────────────

#[test]
fn issue_writes_the_active_record() {
    let h = Harness::new();
    let (outcome, report) = h.run(&[
        "issue",
        "--fingerprint",
        FP,
        "--company",
        "Acme Corp",
        "--email",
        "ops@acme.com",
        "--duration",
        "10",
    ]);

    assert_eq!(outcome, Outcome::Accepted);
    let stored = read_record(&h.active_file());
    assert_eq!(report.get("license_key"), Some(stored.license_key.as_str()));
    assert_eq!(
        stored.expires_at().unwrap(),
        h.clock.now() + Duration::days(10)
    );
    assert_eq!(stored.version, "3.2.4");
}

#[test]
fn issue_with_bad_fields_writes_nothing() {
    let h = Harness::new();
    let (outcome, report) = h.run(&[
        "issue",
        "--fingerprint",
        "short",
        "--company",
        "Acme Corp",
        "--email",
        "ops@acme.com",
    ]);

    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(report.get("errors"), Some(r#"["Invalid hardware fingerprint format"]"#));
    assert!(!h.active_file().exists());
}

#[test]
fn expire_marks_an_issued_license() {
    let h = Harness::new();
    h.run(&["process", "--title", NEW_TITLE, "--body", BODY]);

    let (outcome, report) = h.run(&["expire", "--fingerprint", FP]);
    assert_eq!(outcome, Outcome::Accepted);
    assert_eq!(report.get("valid"), Some("true"));
    assert_eq!(read_record(&h.active_file()).status.as_str(), "expired");
}

#[test]
fn expire_unknown_fingerprint_is_rejected() {
    let h = Harness::new();
    let (outcome, report) = h.run(&["expire", "--fingerprint", FP]);

    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(
        report.get("errors"),
        Some(r#"["No license on record for hardware fingerprint AB12CD34EF56GH78"]"#)
    );
}

// ── process ──────────────────────────────────────────────────────

#[test]
fn reactivation_request_inside_window_extends_license() {
    let h = Harness::new();
    let (outcome, _) = h.run(&["process", "--title", NEW_TITLE, "--body", BODY]);
    assert_eq!(outcome, Outcome::Accepted);

    let (outcome, report) = h.run(&["process", "--title", REACTIVATION_TITLE, "--body", BODY]);
    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(report.get("decision"), Some("rejected"));

    h.clock.advance(Duration::days(27));
    let (outcome, report) = h.run(&["process", "--title", REACTIVATION_TITLE, "--body", BODY]);
    assert_eq!(outcome, Outcome::Accepted);
    assert_eq!(report.get("request_kind"), Some("reactivation"));
    assert_eq!(report.get("reactivation_count"), Some("1"));

    let history = h.dir.path().join("data").join("license-history");
    assert_eq!(std::fs::read_dir(history).unwrap().count(), 1);
}

// ── check-expiring / reactivate ──────────────────────────────────

#[test]
fn scheduled_run_finds_and_extends_expiring_licenses() {
    let h = Harness::new();
    h.run(&["process", "--title", NEW_TITLE, "--body", BODY]);
    let issued = read_record(&h.active_file());
    h.clock.advance(Duration::days(26));

    let listing = h.dir.path().join("expiring_licenses.json");
    let listing_arg = listing.display().to_string();
    let (outcome, report) = h.run(&["check-expiring", "--write", &listing_arg]);
    assert_eq!(outcome, Outcome::Accepted);
    assert_eq!(report.get("total_licenses"), Some("1"));
    assert_eq!(report.get("expiring_count"), Some("1"));
    let listed: Vec<LicenseRecord> =
        serde_json::from_str(&std::fs::read_to_string(&listing).unwrap()).unwrap();
    assert_eq!(listed, vec![issued.clone()]);

    let (outcome, report) = h.run(&["reactivate"]);
    assert_eq!(outcome, Outcome::Accepted);
    assert_eq!(report.get("reactivated_count"), Some("1"));
    assert_eq!(report.get("failed_count"), Some("0"));

    let extended = read_record(&h.active_file());
    assert_eq!(
        extended.expires_at().unwrap(),
        issued.expires_at().unwrap() + Duration::days(30)
    );
    assert_eq!(extended.reactivation_count, 1);
}

#[test]
fn empty_store_scans_nothing() {
    let h = Harness::new();
    let (outcome, report) = h.run(&["check-expiring"]);

    assert_eq!(outcome, Outcome::Accepted);
    assert_eq!(report.get("total_licenses"), Some("0"));
    assert_eq!(report.get("expiring_count"), Some("0"));
}
