//! `licensor`: license lifecycle authority for hardware-bound activations.
//!
//! Usage:
//!   licensor process --title "Auto-Activation Request - Acme - AB12CD34EF56GH78" --body "$BODY"
//!   licensor check-expiring --write expiring_licenses.json
//!   licensor reactivate
//!
//! Decision fields are appended to `--output`, `$GITHUB_OUTPUT` or stdout.

use anyhow::Result;
use clap::Parser;
use licensor_cli::{run, Cli, Outcome, OutputSink};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut sink = OutputSink::resolve(cli.output.as_deref());
    match run(&cli, &mut sink)? {
        Outcome::Accepted => Ok(ExitCode::SUCCESS),
        Outcome::Rejected => {
            info!("Request rejected");
            Ok(ExitCode::FAILURE)
        }
    }
}
