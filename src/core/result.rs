//! Analysis results and verdict aggregation.
//!
//! An `AnalysisSnapshot` is what one fetch returned. A `ScanSummary` is
//! always recomputed from a snapshot's full verdict mapping; summaries from
//! earlier polls are never merged into later ones.

use crate::core::state::ProviderStatus;
use crate::core::types::{EngineVerdict, Severity, VerdictCategory};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-engine verdicts keyed by engine identifier.
pub type VerdictMap = BTreeMap<String, EngineVerdict>;

/// The provider's answer to one fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    /// Pipeline status reported by the provider.
    pub status: ProviderStatus,

    /// Verdicts reported so far. May be empty, or partial while queued.
    pub verdicts: VerdictMap,

    /// When the response was received.
    pub observed_at: DateTime<Utc>,
}

impl AnalysisSnapshot {
    /// Creates a snapshot with no verdicts.
    pub fn new(status: ProviderStatus) -> Self {
        Self {
            status,
            verdicts: VerdictMap::new(),
            observed_at: Utc::now(),
        }
    }

    /// Creates a completed snapshot from verdicts.
    pub fn completed(verdicts: VerdictMap) -> Self {
        Self::new(ProviderStatus::Completed).with_verdicts(verdicts)
    }

    /// Replaces the verdict mapping.
    pub fn with_verdicts(mut self, verdicts: VerdictMap) -> Self {
        self.verdicts = verdicts;
        self
    }

    /// Adds one verdict keyed by engine identifier.
    pub fn with_verdict(mut self, engine: impl Into<String>, verdict: EngineVerdict) -> Self {
        self.verdicts.insert(engine.into(), verdict);
        self
    }

    /// Summarizes the verdicts in this snapshot.
    pub fn summary(&self) -> ScanSummary {
        aggregate(&self.verdicts)
    }
}

/// Number of engines per verdict category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    /// Engines reporting malicious.
    pub malicious: u32,
    /// Engines reporting suspicious.
    pub suspicious: u32,
    /// Engines reporting harmless.
    pub harmless: u32,
    /// Engines that detected nothing.
    pub undetected: u32,
    /// Engines that timed out.
    pub timeout: u32,
    /// Engines that cannot handle the artifact type.
    #[serde(rename = "type-unsupported")]
    pub type_unsupported: u32,
    /// Engines with a confirmed timeout.
    #[serde(rename = "confirmed-timeout")]
    pub confirmed_timeout: u32,
    /// Engines that failed.
    pub failure: u32,
    /// Engines reporting a category this library does not know.
    pub other: u32,
}

impl VerdictCounts {
    /// Adds one engine in `category`.
    pub fn record(&mut self, category: &VerdictCategory) {
        let slot = match category {
            VerdictCategory::Malicious => &mut self.malicious,
            VerdictCategory::Suspicious => &mut self.suspicious,
            VerdictCategory::Harmless => &mut self.harmless,
            VerdictCategory::Undetected => &mut self.undetected,
            VerdictCategory::Timeout => &mut self.timeout,
            VerdictCategory::TypeUnsupported => &mut self.type_unsupported,
            VerdictCategory::ConfirmedTimeout => &mut self.confirmed_timeout,
            VerdictCategory::Failure => &mut self.failure,
            VerdictCategory::Other(_) => &mut self.other,
        };
        *slot += 1;
    }

    /// Returns the total number of engines counted.
    pub fn total(&self) -> u32 {
        self.malicious
            + self.suspicious
            + self.harmless
            + self.undetected
            + self.timeout
            + self.type_unsupported
            + self.confirmed_timeout
            + self.failure
            + self.other
    }

    /// Returns `true` if no engine has been counted.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Returns the most severe tier with a non-zero count.
    pub fn overall_severity(&self) -> Severity {
        if self.malicious > 0 {
            Severity::Malicious
        } else if self.suspicious > 0 {
            Severity::Suspicious
        } else if self.type_unsupported + self.confirmed_timeout + self.failure + self.other > 0 {
            Severity::Inconclusive
        } else if self.timeout > 0 {
            Severity::Timeout
        } else if self.harmless + self.undetected > 0 {
            Severity::Harmless
        } else {
            Severity::Undetermined
        }
    }
}

/// Summary of one verdict mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Engines per category.
    pub counts: VerdictCounts,

    /// Most severe category present.
    pub overall_severity: Severity,

    /// Number of engines in the mapping.
    pub engine_count: u32,
}

impl ScanSummary {
    /// Returns `true` if engines have reported and none flagged anything.
    pub fn is_clean(&self) -> bool {
        self.overall_severity == Severity::Harmless
    }

    /// Returns the number of malicious plus suspicious verdicts.
    pub fn detections(&self) -> u32 {
        self.counts.malicious + self.counts.suspicious
    }
}

impl Default for ScanSummary {
    fn default() -> Self {
        aggregate(&VerdictMap::new())
    }
}

/// Reduces a verdict mapping to per-category counts and an overall severity.
///
/// Pure and total: any mapping, including an empty one, yields a summary.
pub fn aggregate(verdicts: &VerdictMap) -> ScanSummary {
    let mut counts = VerdictCounts::default();
    for verdict in verdicts.values() {
        counts.record(&verdict.category);
    }

    ScanSummary {
        overall_severity: counts.overall_severity(),
        engine_count: counts.total(),
        counts,
    }
}

/// Returns the engines that reported malicious or suspicious, worst first.
pub fn detecting_engines(verdicts: &VerdictMap) -> Vec<(&str, &EngineVerdict)> {
    let mut hits: Vec<_> = verdicts
        .iter()
        .filter(|(_, v)| v.category.is_detection())
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    hits.sort_by(|a, b| b.1.category.severity().cmp(&a.1.category.severity()));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdicts(entries: &[(&str, VerdictCategory)]) -> VerdictMap {
        entries
            .iter()
            .map(|(engine, category)| {
                (
                    engine.to_string(),
                    EngineVerdict::new(*engine, category.clone()),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_mapping() {
        let summary = aggregate(&VerdictMap::new());
        assert_eq!(summary.counts, VerdictCounts::default());
        assert_eq!(summary.engine_count, 0);
        assert_eq!(summary.overall_severity, Severity::Undetermined);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_malicious_dominates() {
        let mut map = verdicts(&[
            ("a", VerdictCategory::Malicious),
            ("s", VerdictCategory::Suspicious),
            ("f", VerdictCategory::Failure),
        ]);
        for i in 0..50 {
            let name = format!("h{}", i);
            map.insert(
                name.clone(),
                EngineVerdict::new(name, VerdictCategory::Harmless),
            );
        }

        let summary = aggregate(&map);
        assert_eq!(summary.overall_severity, Severity::Malicious);
        assert_eq!(summary.counts.malicious, 1);
        assert_eq!(summary.counts.harmless, 50);
        assert_eq!(summary.detections(), 2);
    }

    #[test]
    fn test_harmless_and_undetected_are_clean() {
        let summary = aggregate(&verdicts(&[
            ("a", VerdictCategory::Harmless),
            ("b", VerdictCategory::Undetected),
        ]));
        assert_eq!(summary.overall_severity, Severity::Harmless);
        assert!(summary.is_clean());
    }

    #[test]
    fn test_severity_tiers() {
        let timeout = aggregate(&verdicts(&[
            ("a", VerdictCategory::Harmless),
            ("b", VerdictCategory::Timeout),
        ]));
        assert_eq!(timeout.overall_severity, Severity::Timeout);

        let inconclusive = aggregate(&verdicts(&[
            ("a", VerdictCategory::Timeout),
            ("b", VerdictCategory::TypeUnsupported),
        ]));
        assert_eq!(inconclusive.overall_severity, Severity::Inconclusive);

        let suspicious = aggregate(&verdicts(&[
            ("a", VerdictCategory::ConfirmedTimeout),
            ("b", VerdictCategory::Suspicious),
        ]));
        assert_eq!(suspicious.overall_severity, Severity::Suspicious);
    }

    #[test]
    fn test_unknown_category_bucketed() {
        let summary = aggregate(&verdicts(&[
            ("a", VerdictCategory::Harmless),
            ("b", VerdictCategory::Other("quarantined".into())),
        ]));
        assert_eq!(summary.counts.other, 1);
        assert_eq!(summary.engine_count, 2);
        assert_eq!(summary.overall_severity, Severity::Inconclusive);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let map = verdicts(&[
            ("a", VerdictCategory::Malicious),
            ("b", VerdictCategory::Undetected),
            ("c", VerdictCategory::Other("x".into())),
        ]);
        assert_eq!(aggregate(&map), aggregate(&map));
    }

    #[test]
    fn test_later_snapshot_supersedes() {
        let first = AnalysisSnapshot::new(ProviderStatus::Queued)
            .with_verdict("a", EngineVerdict::new("a", VerdictCategory::Suspicious));
        let second = AnalysisSnapshot::completed(verdicts(&[
            ("a", VerdictCategory::Harmless),
            ("b", VerdictCategory::Harmless),
        ]));

        assert_eq!(first.summary().overall_severity, Severity::Suspicious);
        let summary = second.summary();
        assert_eq!(summary.counts.suspicious, 0);
        assert_eq!(summary.counts.harmless, 2);
    }

    #[test]
    fn test_counts_serialize_with_provider_names() {
        let json = serde_json::to_value(VerdictCounts::default()).unwrap();
        assert!(json.get("type-unsupported").is_some());
        assert!(json.get("confirmed-timeout").is_some());
    }

    #[test]
    fn test_detecting_engines_sorted() {
        let map = verdicts(&[
            ("a", VerdictCategory::Suspicious),
            ("b", VerdictCategory::Harmless),
            ("c", VerdictCategory::Malicious),
        ]);
        let hits = detecting_engines(&map);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "c");
        assert_eq!(hits[1].0, "a");
    }
}
