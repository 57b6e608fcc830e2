//! Subcommands and their dispatch.
//!
//! Every command emits exactly one [`Report`] and maps its decision to an
//! [`Outcome`]; infrastructure failures surface as errors instead.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use licensor_core::{
    evaluate_version, extract_version, validate_request, ActivationRequest, Clock,
    HardwareFingerprint, LifecycleOrchestrator, PolicyConfig, Report, ReportSink, RequestKind,
    SystemClock,
};
use licensor_store::FileRecordStore;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "licensor")]
#[command(about = "License lifecycle authority for hardware-bound activations")]
pub struct Cli {
    /// Root directory holding active licenses and their history
    #[arg(long, default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Path to the activation settings file
    #[arg(short, long, default_value = "config/activation-config.json", global = true)]
    pub config: PathBuf,

    /// File to append key=value output to (defaults to $GITHUB_OUTPUT, then stdout)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a request's fields without issuing anything
    Validate(RequestArgs),
    /// Evaluate the declared client version against the policy
    CheckVersion(RequestArgs),
    /// Issue a license for already-known fields
    Issue {
        #[arg(long)]
        fingerprint: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        /// Client version to record (defaults to the latest version)
        #[arg(long)]
        software_version: Option<String>,
        /// Validity in days (defaults to the configured duration)
        #[arg(long)]
        duration: Option<i64>,
    },
    /// Validate a request, then issue or reactivate
    Process(RequestArgs),
    /// Report licenses inside the expiring window
    CheckExpiring {
        /// Also write the expiring records to this JSON file
        #[arg(long)]
        write: Option<PathBuf>,
    },
    /// Extend every expiring license
    Reactivate,
    /// Mark a license expired
    Expire {
        #[arg(long)]
        fingerprint: String,
    },
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Request title
    #[arg(long)]
    pub title: String,

    /// Request body
    #[arg(long, default_value = "")]
    pub body: String,
}

/// How a command ended, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected,
}

impl Outcome {
    fn from_accepted(accepted: bool) -> Self {
        if accepted { Self::Accepted } else { Self::Rejected }
    }
}

/// Runs a command against the wall clock.
pub fn run(cli: &Cli, sink: &mut dyn ReportSink) -> Result<Outcome> {
    execute(cli, SystemClock, sink)
}

/// Runs a command with an explicit time source.
pub fn execute<C: Clock>(cli: &Cli, clock: C, sink: &mut dyn ReportSink) -> Result<Outcome> {
    let policy = PolicyConfig::load(&cli.config);
    debug!(command = ?cli.command, "Dispatching");

    match &cli.command {
        Command::Validate(args) => {
            let outcome = validate_request(&args.title, &args.body);
            emit(sink, &Report::validation(&outcome))?;
            Ok(Outcome::from_accepted(outcome.is_ok()))
        }
        Command::CheckVersion(args) => {
            let kind = RequestKind::detect(&args.title, &args.body);
            let decision = evaluate_version(
                extract_version(&args.body).as_deref(),
                &policy,
                kind.is_reactivation(),
            );
            let mut report = Report::version(&decision);
            report.set("request_kind", kind.as_str());
            emit(sink, &report)?;
            Ok(Outcome::from_accepted(
                decision.valid || !policy.enforce_version_check,
            ))
        }
        Command::Issue {
            fingerprint,
            company,
            email,
            name,
            software_version,
            duration,
        } => {
            let validated = ActivationRequest::from_fields(
                Some(fingerprint.as_str()),
                Some(company.as_str()),
                Some(email.as_str()),
                name.clone(),
                software_version.clone(),
                RequestKind::NewActivation,
            );
            let mut report = Report::validation(&validated);
            let Ok(request) = validated else {
                emit(sink, &report)?;
                return Ok(Outcome::Rejected);
            };
            let days = duration.unwrap_or(policy.default_duration_days);
            let orchestrator = orchestrator(cli, clock, policy)?;
            let record = orchestrator
                .issue_for_days(&request, days)
                .with_context(|| format!("failed to issue license for {}", request.fingerprint))?;
            info!(
                fingerprint = %record.hardware_fingerprint,
                expires = %record.expires_date,
                "License issued"
            );
            report.merge(&Report::record(&record)?);
            emit(sink, &report)?;
            Ok(Outcome::Accepted)
        }
        Command::Process(args) => {
            let orchestrator = orchestrator(cli, clock, policy)?;
            let decision = orchestrator
                .handle_request(&args.title, &args.body)
                .context("failed to process request")?;
            emit(sink, &Report::decision(&decision)?)?;
            Ok(Outcome::from_accepted(decision.is_accepted()))
        }
        Command::CheckExpiring { write } => {
            let orchestrator = orchestrator(cli, clock, policy)?;
            let scan = orchestrator
                .scan_expiring()
                .context("failed to scan licenses")?;
            if let Some(path) = write {
                let json = serde_json::to_string_pretty(&scan.expiring)?;
                fs::write(path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            emit(sink, &Report::scan(&scan))?;
            Ok(Outcome::Accepted)
        }
        Command::Reactivate => {
            let orchestrator = orchestrator(cli, clock, policy)?;
            let run = orchestrator
                .reactivate_expiring()
                .context("failed to reactivate licenses")?;
            emit(sink, &Report::reactivation(&run))?;
            Ok(Outcome::Accepted)
        }
        Command::Expire { fingerprint } => {
            let fingerprint = match HardwareFingerprint::parse(fingerprint) {
                Ok(fp) => fp,
                Err(e) => {
                    emit(sink, &Report::validation(&Err(vec![e])))?;
                    return Ok(Outcome::Rejected);
                }
            };
            let orchestrator = orchestrator(cli, clock, policy)?;
            let expired = orchestrator
                .mark_expired(&fingerprint)
                .with_context(|| format!("failed to expire license for {fingerprint}"))?;
            let mut report = Report::new();
            match &expired {
                Some(record) => {
                    report.set("valid", true).merge(&Report::record(record)?);
                }
                None => {
                    let reason =
                        format!("No license on record for hardware fingerprint {fingerprint}");
                    report
                        .set("valid", false)
                        .set("errors", serde_json::to_string(&[reason])?);
                }
            }
            emit(sink, &report)?;
            Ok(Outcome::from_accepted(expired.is_some()))
        }
    }
}

fn orchestrator<C: Clock>(
    cli: &Cli,
    clock: C,
    policy: PolicyConfig,
) -> Result<LifecycleOrchestrator<FileRecordStore, C>> {
    let store = FileRecordStore::open(&cli.data_dir)
        .with_context(|| format!("failed to open license store at {}", cli.data_dir.display()))?;
    Ok(LifecycleOrchestrator::new(store, clock, policy))
}

fn emit(sink: &mut dyn ReportSink, report: &Report) -> Result<()> {
    sink.emit(report).context("failed to write decision output")
}
