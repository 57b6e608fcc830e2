//! Policy configuration.
//!
//! Loaded once per invocation and passed explicitly into the version policy
//! and the orchestrator. A missing or malformed config file is never fatal:
//! the lenient loader logs and falls back to the documented defaults.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Default minimum and latest client version.
pub const DEFAULT_VERSION: &str = "3.2.4";

/// Default issuance duration in days.
pub const DEFAULT_DURATION_DAYS: i64 = 30;

/// Default expiring-window lookahead in days.
pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 5;

/// Version and issuance policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Oldest client version accepted for new activations.
    pub minimum_version: String,
    /// Current release; anything older is flagged warning-only.
    pub latest_version: String,
    /// Reject requests whose version decision is invalid.
    pub enforce_version_check: bool,
    /// Let reactivations through regardless of client version.
    pub allow_older_reactivations: bool,
    /// Validity window of a newly issued license, in days.
    pub default_duration_days: i64,
    /// Lookahead used to flag licenses as expiring, in days.
    pub expiry_window_days: i64,
    /// Recorded on issued licenses as `generated_by`.
    pub generated_by: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            minimum_version: DEFAULT_VERSION.to_string(),
            latest_version: DEFAULT_VERSION.to_string(),
            enforce_version_check: true,
            allow_older_reactivations: true,
            default_duration_days: DEFAULT_DURATION_DAYS,
            expiry_window_days: DEFAULT_EXPIRY_WINDOW_DAYS,
            generated_by: "licensor".to_string(),
        }
    }
}

/// On-disk document shape: settings live under `activation_settings`.
#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    activation_settings: PolicyConfig,
}

impl PolicyConfig {
    /// Parses a config document strictly.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the JSON is malformed.
    pub fn from_json_str(json: &str) -> LicenseResult<Self> {
        let doc: ConfigDocument =
            serde_json::from_str(json).map_err(|e| LicenseError::Config(e.to_string()))?;
        Ok(doc.activation_settings)
    }

    /// Loads the config at `path`, falling back to defaults on any problem.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No policy config found, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read policy config, using defaults"
                );
                return Self::default();
            }
        };

        match Self::from_json_str(&json) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Malformed policy config, using defaults"
                );
                Self::default()
            }
        }
    }
}
