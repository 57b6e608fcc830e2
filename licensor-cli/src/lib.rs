//! Workflow-facing surface of the license authority.
//!
//! Every subcommand wires the filesystem store, the policy file and a clock
//! to the core, then writes its decision fields as `key=value` lines to an
//! [`OutputSink`]. Logs go to stderr and never mix with decision output.

mod commands;
mod sink;

pub use commands::{execute, run, Cli, Command, Outcome, RequestArgs};
pub use sink::{OutputSink, OUTPUT_ENV};
