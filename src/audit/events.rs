//! Audit event types and emission functions.

use crate::core::{detecting_engines, AnalysisHandle, ScanTarget};
use crate::manager::ScanUpdate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit event for a finished scan session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Provider analysis id.
    pub analysis_id: String,

    /// Provider that ran the analysis.
    pub provider: String,

    /// Target kind.
    pub kind: String,

    /// SHA-256 of the submitted file, if any.
    pub sha256: Option<String>,

    /// Terminal state name.
    pub state: String,

    /// Overall severity of the last observed verdicts.
    pub severity: String,

    /// Number of engines that reported.
    pub engine_count: u32,

    /// Engines that flagged the target.
    pub detections: Vec<DetectionSummary>,

    /// Number of fetches performed.
    pub attempts: u32,

    /// Polling duration in milliseconds.
    pub duration_ms: u64,

    /// Failure description, if the session did not complete.
    pub error: Option<String>,
}

/// One engine detection for audit logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Engine name.
    pub engine: String,
    /// Verdict category.
    pub category: String,
    /// Engine-specific label.
    pub label: String,
}

impl ScanAuditEvent {
    /// Builds the event from the last update of a session.
    pub fn finished(handle: &AnalysisHandle, update: &ScanUpdate, elapsed: Duration) -> Self {
        let detections = detecting_engines(&update.verdicts)
            .into_iter()
            .map(|(engine, verdict)| DetectionSummary {
                engine: engine.to_string(),
                category: verdict.category.as_str().to_string(),
                label: verdict.label().to_string(),
            })
            .collect();

        Self {
            timestamp: update.observed_at,
            analysis_id: handle.id.clone(),
            provider: handle.provider.clone(),
            kind: handle.kind.to_string(),
            sha256: handle.sha256.clone(),
            state: update.state.name().to_string(),
            severity: update.summary.overall_severity.to_string(),
            engine_count: update.summary.engine_count,
            detections,
            attempts: update.attempt,
            duration_ms: elapsed.as_millis() as u64,
            error: update.error.clone(),
        }
    }
}

impl AuditEvent for ScanAuditEvent {
    fn event_type(&self) -> &'static str {
        "scan_finished"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for an accepted submission.
pub fn emit_scan_submitted(handle: &AnalysisHandle, target: &ScanTarget) {
    tracing::info!(
        target: "imsafe::audit",
        event_type = "scan_submitted",
        analysis_id = %handle.id,
        provider = %handle.provider,
        kind = %handle.kind,
        sha256 = ?handle.sha256,
        filename = ?target.filename(),
        size = ?target.size(),
        "Scan submitted"
    );
}

/// Emits an audit event for one observed poll result.
pub fn emit_poll_observed(update: &ScanUpdate) {
    tracing::debug!(
        target: "imsafe::audit",
        event_type = "poll_observed",
        analysis_id = %update.handle_id,
        attempt = update.attempt,
        state = %update.state,
        engine_count = update.summary.engine_count,
        severity = %update.summary.overall_severity,
        error = ?update.error,
        "Poll observed"
    );
}

/// Emits an audit event for the end of a scan session.
pub fn emit_scan_finished(handle: &AnalysisHandle, update: &ScanUpdate, elapsed: Duration) {
    let event = ScanAuditEvent::finished(handle, update, elapsed);

    tracing::info!(
        target: "imsafe::audit",
        event_type = event.event_type(),
        analysis_id = %event.analysis_id,
        provider = %event.provider,
        kind = %event.kind,
        sha256 = ?event.sha256,
        state = %event.state,
        severity = %event.severity,
        engine_count = event.engine_count,
        detections = ?event.detections,
        detection_count = event.detections.len(),
        attempts = event.attempts,
        duration_ms = event.duration_ms,
        error = ?event.error,
        "Scan finished"
    );
}
