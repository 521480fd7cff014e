//! Core types and traits for the imsafe library.
//!
//! - [`types`] - Analysis handles, engine verdicts, severities
//! - [`state`] - The scan session state machine
//! - [`traits`] - The `ScanProvider` trait
//! - [`error`] - Structured error types
//! - [`input`] - Scan target abstraction
//! - [`hasher`] - SHA-256 content hashing
//! - [`result`] - Snapshots, summaries and aggregation

pub mod error;
pub mod hasher;
pub mod input;
pub mod result;
pub mod state;
pub mod traits;
pub mod types;

pub use error::{ScanError, ScanResult};
pub use hasher::FileHasher;
pub use input::{ScanTarget, TargetKind, MAX_FILE_SIZE};
pub use result::{
    aggregate, detecting_engines, AnalysisSnapshot, ScanSummary, VerdictCounts, VerdictMap,
};
pub use state::{PollEvent, ProviderStatus, ScanState};
pub use traits::{ArcProvider, BoxedProvider, ScanProvider};
pub use types::{AnalysisHandle, EngineVerdict, Severity, VerdictCategory};
