use licensor_core::{Report, ReportSink};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Environment variable naming the workflow's step output file.
pub const OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Where decision reports are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// Appends to a file, creating it if needed.
    File(PathBuf),
    /// Writes to standard output.
    Stdout,
}

impl OutputSink {
    /// Picks the destination: an explicit path, then `$GITHUB_OUTPUT`, then
    /// stdout.
    #[must_use]
    pub fn resolve(explicit: Option<&Path>) -> Self {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| {
                std::env::var_os(OUTPUT_ENV)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            })
            .map_or(Self::Stdout, Self::File)
    }
}

impl ReportSink for OutputSink {
    fn emit(&mut self, report: &Report) -> io::Result<()> {
        match self {
            Self::File(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                write!(file, "{report}")?;
                file.flush()
            }
            Self::Stdout => {
                let mut out = io::stdout().lock();
                write!(out, "{report}")?;
                out.flush()
            }
        }
    }
}
