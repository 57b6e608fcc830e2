//! Activation request parsing and validation.
//!
//! Requests arrive as two opaque text blobs (a title and a body). Every field
//! is extracted and validated independently, and all failures are reported
//! together so the requester gets complete feedback in one round trip.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Length of a hardware fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

static FINGERPRINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{16}$").expect("fingerprint pattern is valid"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

// "<prefix> - <company> - <fingerprint>"
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:auto-)?(?:re)?activation request - (.+?) - (.+?)\s*$")
        .expect("title pattern is valid")
});

static VERSION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["Software Version", "Client Version", "Version", "App Version"]
        .iter()
        .map(|label| {
            Regex::new(&format!(r"(?i){label}:\s*([0-9]+\.[0-9]+\.[0-9]+)"))
                .expect("version pattern is valid")
        })
        .collect()
});

/// A single violated request rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    /// No fingerprint in the title or the body.
    #[error("Hardware fingerprint not found")]
    FingerprintMissing,
    /// Fingerprint is not 16 alphanumeric characters.
    #[error("Invalid hardware fingerprint format")]
    FingerprintInvalid,
    /// No company in the title or the body.
    #[error("Company name not found")]
    CompanyMissing,
    /// Company is shorter than two characters.
    #[error("Company name too short")]
    CompanyTooShort,
    /// No `Email:` field in the body.
    #[error("Contact email not found")]
    EmailMissing,
    /// Email does not look like `local@domain.tld`.
    #[error("Invalid email format")]
    EmailInvalid,
}

/// A validated 16-character alphanumeric hardware identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HardwareFingerprint(String);

impl HardwareFingerprint {
    /// Validates and wraps a fingerprint. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::FingerprintInvalid`] unless the value is
    /// exactly 16 ASCII letters or digits.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if FINGERPRINT_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ValidationError::FingerprintInvalid)
        }
    }

    /// Returns the fingerprint text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HardwareFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HardwareFingerprint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HardwareFingerprint {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HardwareFingerprint> for String {
    fn from(fp: HardwareFingerprint) -> Self {
        fp.0
    }
}

/// Whether a request asks for a new license or an extension of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// First activation for this fingerprint.
    NewActivation,
    /// Extension of an existing license.
    Reactivation,
}

impl RequestKind {
    /// Classifies a request: any mention of "reactivation" in the title or
    /// body makes it a reactivation.
    #[must_use]
    pub fn detect(title: &str, body: &str) -> Self {
        let mentions = |text: &str| text.to_lowercase().contains("reactivation");
        if mentions(title) || mentions(body) {
            Self::Reactivation
        } else {
            Self::NewActivation
        }
    }

    /// Returns true for [`RequestKind::Reactivation`].
    #[must_use]
    pub fn is_reactivation(&self) -> bool {
        matches!(self, Self::Reactivation)
    }

    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewActivation => "new_activation",
            Self::Reactivation => "reactivation",
        }
    }
}

/// A fully validated activation or reactivation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    /// Hardware identity the license is bound to.
    pub fingerprint: HardwareFingerprint,
    /// Requesting organization.
    pub company: String,
    /// Contact address.
    pub email: String,
    /// Optional contact person.
    pub contact_name: Option<String>,
    /// Client software version declared in the body, if any.
    pub software_version: Option<String>,
    /// New activation or reactivation.
    pub kind: RequestKind,
}

/// Result of validating a raw request.
pub type ValidationOutcome = Result<ActivationRequest, Vec<ValidationError>>;

/// Extracts and validates a request from its title and body.
///
/// The fingerprint and company come from a title shaped like
/// `"Auto-Activation Request - <company> - <fingerprint>"`, falling back to
/// the `Hardware Fingerprint:` and `Company:` body fields. The email comes
/// from `Email:` and the optional contact name from `Contact:`.
///
/// # Errors
///
/// Returns every violated rule, in field order, if any field is invalid.
pub fn validate_request(title: &str, body: &str) -> ValidationOutcome {
    let (mut company, mut fingerprint) = match TITLE_RE.captures(title) {
        Some(caps) => (
            caps.get(1).and_then(|m| non_empty(m.as_str())),
            caps.get(2).and_then(|m| non_empty(m.as_str())),
        ),
        None => (None, None),
    };

    if fingerprint.is_none() {
        fingerprint = body_field(body, "Hardware Fingerprint");
    }
    if company.is_none() {
        company = body_field(body, "Company");
    }

    ActivationRequest::from_fields(
        fingerprint.as_deref(),
        company.as_deref(),
        body_field(body, "Email").as_deref(),
        body_field(body, "Contact"),
        extract_version(body),
        RequestKind::detect(title, body),
    )
}

impl ActivationRequest {
    /// Validates already-extracted fields.
    ///
    /// # Errors
    ///
    /// Returns every violated rule, in field order, if any field is invalid.
    pub fn from_fields(
        fingerprint: Option<&str>,
        company: Option<&str>,
        email: Option<&str>,
        contact_name: Option<String>,
        software_version: Option<String>,
        kind: RequestKind,
    ) -> ValidationOutcome {
        let mut errors = Vec::new();

        let fingerprint = match fingerprint.and_then(non_empty) {
            None => {
                errors.push(ValidationError::FingerprintMissing);
                None
            }
            Some(raw) => match HardwareFingerprint::parse(&raw) {
                Ok(fp) => Some(fp),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
        };

        let company = company.and_then(non_empty);
        match company.as_deref() {
            None => errors.push(ValidationError::CompanyMissing),
            Some(c) if c.chars().count() < 2 => errors.push(ValidationError::CompanyTooShort),
            Some(_) => {}
        }

        let email = email.and_then(non_empty);
        match email.as_deref() {
            None => errors.push(ValidationError::EmailMissing),
            Some(e) if !EMAIL_RE.is_match(e) => errors.push(ValidationError::EmailInvalid),
            Some(_) => {}
        }

        match (fingerprint, company, email) {
            (Some(fingerprint), Some(company), Some(email)) if errors.is_empty() => {
                Ok(ActivationRequest {
                    fingerprint,
                    company,
                    email,
                    contact_name: contact_name.and_then(|n| non_empty(&n)),
                    software_version,
                    kind,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Finds the declared client version (`N.N.N`) in a request body.
///
/// Labels are tried in order: `Software Version:`, `Client Version:`,
/// `Version:`, `App Version:`.
#[must_use]
pub fn extract_version(body: &str) -> Option<String> {
    VERSION_RES
        .iter()
        .find_map(|re| re.captures(body))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn body_field(body: &str, label: &str) -> Option<String> {
    let pattern = format!(r"{label}:[ \t]*([^\n]+)");
    let re = Regex::new(&pattern).ok()?;
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
