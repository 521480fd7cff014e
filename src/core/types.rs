//! Core types used throughout the imsafe library.
//!
//! This module defines the analysis handle returned by a provider after
//! submission, the per-engine verdict shape shared by every provider, and
//! the severity scale used to summarize verdicts.

use crate::core::input::TargetKind;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to one submitted analysis.
///
/// Created once per successful submission and passed to every poll for
/// that analysis. A handle is never reused for a different target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisHandle {
    /// Provider issued analysis identifier.
    pub id: String,

    /// When the submission was accepted.
    pub submitted_at: DateTime<Utc>,

    /// What kind of artifact was submitted.
    pub kind: TargetKind,

    /// SHA-256 of the submitted file, for file targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Name of the provider that issued the handle.
    pub provider: String,
}

impl AnalysisHandle {
    /// Creates a new handle stamped with the current time.
    pub fn new(id: impl Into<String>, kind: TargetKind, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submitted_at: Utc::now(),
            kind,
            sha256: None,
            provider: provider.into(),
        }
    }

    /// Sets the content hash.
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Sets the submission time.
    pub fn with_submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }
}

impl fmt::Display for AnalysisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

/// Classification reported by a single engine.
///
/// Unknown provider categories are kept verbatim in `Other` so that a new
/// category never breaks decoding or disappears from the counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VerdictCategory {
    /// The engine flagged the artifact as malicious.
    Malicious,
    /// The engine flagged the artifact as suspicious.
    Suspicious,
    /// The engine considers the artifact harmless.
    Harmless,
    /// The engine did not detect anything.
    Undetected,
    /// The engine timed out.
    Timeout,
    /// The engine cannot handle this artifact type.
    TypeUnsupported,
    /// The engine timed out and the provider confirmed it.
    ConfirmedTimeout,
    /// The engine failed.
    Failure,
    /// A category this library does not know about.
    Other(String),
}

impl VerdictCategory {
    /// Parses a provider category string. Never fails.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "malicious" => Self::Malicious,
            "suspicious" => Self::Suspicious,
            "harmless" => Self::Harmless,
            "undetected" => Self::Undetected,
            "timeout" => Self::Timeout,
            "type-unsupported" => Self::TypeUnsupported,
            "confirmed-timeout" => Self::ConfirmedTimeout,
            "failure" => Self::Failure,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the provider's spelling of this category.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Malicious => "malicious",
            Self::Suspicious => "suspicious",
            Self::Harmless => "harmless",
            Self::Undetected => "undetected",
            Self::Timeout => "timeout",
            Self::TypeUnsupported => "type-unsupported",
            Self::ConfirmedTimeout => "confirmed-timeout",
            Self::Failure => "failure",
            Self::Other(raw) => raw,
        }
    }

    /// Returns the severity tier this category contributes to a summary.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Malicious => Severity::Malicious,
            Self::Suspicious => Severity::Suspicious,
            Self::TypeUnsupported | Self::ConfirmedTimeout | Self::Failure | Self::Other(_) => {
                Severity::Inconclusive
            }
            Self::Timeout => Severity::Timeout,
            Self::Undetected | Self::Harmless => Severity::Harmless,
        }
    }

    /// Returns `true` for malicious and suspicious verdicts.
    pub fn is_detection(&self) -> bool {
        matches!(self, Self::Malicious | Self::Suspicious)
    }
}

impl From<String> for VerdictCategory {
    fn from(raw: String) -> Self {
        Self::from_provider(&raw)
    }
}

impl From<VerdictCategory> for String {
    fn from(category: VerdictCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for VerdictCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One engine's verdict for an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVerdict {
    /// Human-readable engine name.
    pub engine_name: String,

    /// Category assigned by the engine.
    pub category: VerdictCategory,

    /// Detection label (e.g. "Trojan.GenericKD.12345"), if any.
    #[serde(default)]
    pub result: Option<String>,

    /// Detection method (e.g. "blacklist", "signature").
    #[serde(default)]
    pub method: String,

    /// Engine version, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,

    /// Engine signature update stamp, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_update: Option<String>,
}

impl EngineVerdict {
    /// Creates a verdict with the required fields.
    pub fn new(engine_name: impl Into<String>, category: VerdictCategory) -> Self {
        Self {
            engine_name: engine_name.into(),
            category,
            result: None,
            method: String::new(),
            engine_version: None,
            engine_update: None,
        }
    }

    /// Sets the detection label.
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Sets the detection method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets the engine version.
    pub fn with_engine_version(mut self, version: impl Into<String>) -> Self {
        self.engine_version = Some(version.into());
        self
    }

    /// Returns the label to show a user: the detection name, or the category.
    pub fn label(&self) -> &str {
        self.result.as_deref().unwrap_or_else(|| self.category.as_str())
    }
}

/// Overall severity of a summary, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No engine has reported yet.
    Undetermined,
    /// Every engine reported harmless or undetected.
    Harmless,
    /// At least one engine timed out.
    Timeout,
    /// At least one engine could not produce a verdict.
    Inconclusive,
    /// At least one engine reported suspicious.
    Suspicious,
    /// At least one engine reported malicious.
    Malicious,
}

impl Severity {
    /// Returns `true` if the severity should be shown as a warning.
    pub fn is_alarming(&self) -> bool {
        matches!(self, Self::Suspicious | Self::Malicious)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undetermined => write!(f, "undetermined"),
            Self::Harmless => write!(f, "harmless"),
            Self::Timeout => write!(f, "timeout"),
            Self::Inconclusive => write!(f, "inconclusive"),
            Self::Suspicious => write!(f, "suspicious"),
            Self::Malicious => write!(f, "malicious"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_strings() {
        for raw in [
            "malicious",
            "suspicious",
            "harmless",
            "undetected",
            "timeout",
            "type-unsupported",
            "confirmed-timeout",
            "failure",
        ] {
            assert_eq!(VerdictCategory::from_provider(raw).as_str(), raw);
        }
    }

    #[test]
    fn test_unknown_category_kept() {
        let category = VerdictCategory::from_provider("quarantined");
        assert_eq!(category, VerdictCategory::Other("quarantined".into()));
        assert_eq!(category.severity(), Severity::Inconclusive);
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&VerdictCategory::TypeUnsupported).unwrap();
        assert_eq!(json, "\"type-unsupported\"");

        let parsed: VerdictCategory = serde_json::from_str("\"brand-new\"").unwrap();
        assert_eq!(parsed, VerdictCategory::Other("brand-new".into()));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Undetermined < Severity::Harmless);
        assert!(Severity::Harmless < Severity::Timeout);
        assert!(Severity::Timeout < Severity::Inconclusive);
        assert!(Severity::Inconclusive < Severity::Suspicious);
        assert!(Severity::Suspicious < Severity::Malicious);
    }

    #[test]
    fn test_verdict_label() {
        let clean = EngineVerdict::new("Acme", VerdictCategory::Harmless);
        assert_eq!(clean.label(), "harmless");

        let hit = EngineVerdict::new("Acme", VerdictCategory::Malicious).with_result("phishing");
        assert_eq!(hit.label(), "phishing");
    }

    #[test]
    fn test_handle_display() {
        let handle = AnalysisHandle::new("abc==", TargetKind::Url, "virustotal");
        assert_eq!(handle.to_string(), "virustotal:abc==");
        assert!(handle.sha256.is_none());
    }
}
