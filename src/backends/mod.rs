//! Scanning provider implementations.
//!
//! This module contains implementations of the `ScanProvider` trait.
//!
//! ## Available Backends
//!
//! - [`mock`] - A scripted provider for testing
//! - [`virustotal`] - VirusTotal v3 REST API (requires `virustotal` feature)
//!
//! Two lookup clients sit alongside the providers. They answer in one
//! request and do not implement `ScanProvider`:
//!
//! - [`abuseipdb`] - IP reputation (requires `abuseipdb` feature)
//! - [`hibp`] - breached-account search (requires `hibp` feature)
//!
//! ## Implementing a Custom Backend
//!
//! ```rust,ignore
//! use imsafe::core::{AnalysisHandle, AnalysisSnapshot, ScanError, ScanProvider, ScanTarget};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! pub struct MyProvider {
//!     // Your provider's configuration
//! }
//!
//! #[async_trait]
//! impl ScanProvider for MyProvider {
//!     fn name(&self) -> &str {
//!         "my-provider"
//!     }
//!
//!     async fn submit(&self, target: &ScanTarget) -> Result<AnalysisHandle, ScanError> {
//!         todo!()
//!     }
//!
//!     async fn fetch(&self, handle: &AnalysisHandle) -> Result<AnalysisSnapshot, ScanError> {
//!         todo!()
//!     }
//! }
//! ```

#[cfg(feature = "abuseipdb")]
pub mod abuseipdb;
#[cfg(feature = "hibp")]
pub mod hibp;
pub mod mock;

#[cfg(feature = "virustotal")]
pub mod virustotal;

// Re-exports
pub use mock::{MockFailure, MockFetch, MockProvider};

#[cfg(feature = "virustotal")]
pub use virustotal::{VirusTotalConfig, VirusTotalProvider};

#[cfg(feature = "abuseipdb")]
pub use abuseipdb::{AbuseIpDbClient, AbuseIpDbConfig, IpReport};

#[cfg(feature = "hibp")]
pub use hibp::{Breach, HibpClient, HibpConfig};
