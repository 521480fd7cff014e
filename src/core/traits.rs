//! Core traits for the imsafe library.
//!
//! This module defines the `ScanProvider` trait that every scanning
//! backend implements.

use crate::core::error::ScanError;
use crate::core::input::{ScanTarget, MAX_FILE_SIZE};
use crate::core::result::AnalysisSnapshot;
use crate::core::types::AnalysisHandle;

use async_trait::async_trait;
use std::fmt::Debug;

/// A third-party service that analyzes files and URLs asynchronously.
///
/// Submitting returns a handle immediately; the verdicts are collected
/// later by fetching the analysis with that handle.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync` and safe for concurrent use by
///   independent scan sessions. They hold no per-analysis state.
/// - Each call performs exactly one outbound request. Retrying and polling
///   belong to the caller.
/// - Provider-specific response shapes are translated into
///   [`AnalysisSnapshot`] here, so nothing downstream depends on them.
/// - Implementations should never panic; all errors are `ScanError`.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use imsafe::core::{AnalysisHandle, AnalysisSnapshot, ScanError, ScanProvider, ScanTarget};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct MyProvider;
///
/// #[async_trait]
/// impl ScanProvider for MyProvider {
///     fn name(&self) -> &str {
///         "my-provider"
///     }
///
///     async fn submit(&self, target: &ScanTarget) -> Result<AnalysisHandle, ScanError> {
///         todo!()
///     }
///
///     async fn fetch(&self, handle: &AnalysisHandle) -> Result<AnalysisSnapshot, ScanError> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait ScanProvider: Send + Sync + Debug {
    /// Returns a stable identifier like "virustotal".
    fn name(&self) -> &str;

    /// Submits a target for analysis.
    ///
    /// # Errors
    ///
    /// - `Transport` - The provider is unreachable or returned a non-success status.
    /// - `ProviderRejected` - The provider returned a structured rejection.
    /// - `Parse` - The response did not contain an analysis id.
    async fn submit(&self, target: &ScanTarget) -> Result<AnalysisHandle, ScanError>;

    /// Fetches the current state of an analysis.
    ///
    /// # Errors
    ///
    /// - `Transport` - Network failure or non-success status.
    /// - `Parse` - The response body could not be decoded.
    async fn fetch(&self, handle: &AnalysisHandle) -> Result<AnalysisSnapshot, ScanError>;

    /// Lightweight reachability check.
    async fn health_check(&self) -> Result<(), ScanError> {
        Ok(())
    }

    /// Returns the largest file this provider accepts.
    fn max_file_size(&self) -> u64 {
        MAX_FILE_SIZE
    }
}

/// A boxed provider for type-erased storage.
pub type BoxedProvider = Box<dyn ScanProvider>;

/// An arc-wrapped provider for shared ownership.
pub type ArcProvider = std::sync::Arc<dyn ScanProvider>;
