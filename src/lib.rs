//! # imsafe
//!
//! Submit files and URLs to a malware scanning provider, poll the analysis
//! until it settles, and summarize the per-engine verdicts.
//!
//! ## Overview
//!
//! imsafe wraps a remote multi-engine scanning service behind a small,
//! provider-agnostic API:
//!
//! - Validate a target locally before any network call
//! - Submit it and receive an analysis handle
//! - Poll the analysis on a fixed schedule with an explicit state machine
//! - Stream every observed state to a consumer, with cancellation
//! - Reduce the engine verdicts to counts and an overall severity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imsafe::prelude::*;
//! use imsafe::backends::MockProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Arc::new(
//!         ScanManager::builder()
//!             .with_provider(MockProvider::new())
//!             .build()?,
//!     );
//!
//!     let mut session = manager.scan(&ScanTarget::from_url("https://example.com")).await?;
//!     while let Some(update) = session.next_update().await {
//!         println!("{}: {}", update.state, update.summary.overall_severity);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `virustotal` - VirusTotal v3 provider (default)
//! - `abuseipdb` - AbuseIPDB IP reputation client (default)
//! - `hibp` - Have I Been Pwned breach client (default)
//! - `server` - the `imsafe-server` HTTP binary (default)
//!
//! ## Architecture
//!
//! - **Core**: Targets, handles, verdicts, the state machine, aggregation
//! - **Backends**: Provider implementations
//! - **Manager**: Submission, the poll loop and scan sessions
//! - **Audit**: Structured logging of submissions and outcomes
//! - **Server**: The HTTP surface and its configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
#[cfg(feature = "server")]
pub mod config;
pub mod core;
pub mod manager;
#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types at the crate root
pub use crate::core::{
    aggregate, AnalysisHandle, AnalysisSnapshot, EngineVerdict, FileHasher, ProviderStatus,
    ScanError, ScanProvider, ScanResult, ScanState, ScanSummary, ScanTarget, Severity,
    TargetKind, VerdictCategory, VerdictCounts, VerdictMap,
};

pub use crate::manager::{PollConfig, ScanManager, ScanManagerConfig, ScanSession, ScanUpdate};

/// Prelude module for convenient imports.
///
/// ```rust
/// use imsafe::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        aggregate, AnalysisHandle, AnalysisSnapshot, EngineVerdict, ProviderStatus, ScanError,
        ScanProvider, ScanResult, ScanState, ScanSummary, ScanTarget, Severity, TargetKind,
        VerdictCategory, VerdictMap,
    };
    pub use crate::manager::{PollConfig, ScanManager, ScanManagerConfig, ScanSession, ScanUpdate};
}
