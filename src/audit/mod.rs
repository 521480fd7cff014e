//! Structured audit logging for scan sessions.
//!
//! This module provides functions for emitting structured audit events
//! using the `tracing` crate under the `imsafe::audit` target. Events can
//! be captured by any tracing subscriber (JSON file, journald, etc.).

mod events;

pub use events::{
    emit_poll_observed, emit_scan_finished, emit_scan_submitted, AuditEvent, DetectionSummary,
    ScanAuditEvent,
};
