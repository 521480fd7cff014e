//! Mock provider for testing.
//!
//! `MockProvider` replays a scripted sequence of fetch responses and
//! counts every call, so tests can assert exactly how many requests a
//! workflow would have sent.

use crate::core::{
    AnalysisHandle, AnalysisSnapshot, FileHasher, ProviderStatus, ScanError, ScanProvider,
    ScanTarget,
};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

/// A failure the mock should simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Network failure or non-success status.
    Transport,
    /// Undecodable response body.
    Parse,
    /// Structured provider rejection.
    Rejected,
}

impl MockFailure {
    fn into_error(self, provider: &str) -> ScanError {
        match self {
            Self::Transport => ScanError::transport(provider, Some(503), "simulated failure"),
            Self::Parse => ScanError::parse(provider, "simulated malformed body"),
            Self::Rejected => {
                ScanError::rejected(provider, "BadRequestError", "simulated rejection")
            }
        }
    }
}

/// One scripted fetch response.
#[derive(Debug, Clone)]
pub enum MockFetch {
    /// Return this snapshot.
    Snapshot(AnalysisSnapshot),
    /// Fail the fetch.
    Fail(MockFailure),
}

/// A scripted provider for tests and demos.
///
/// # Examples
///
/// ```rust
/// use imsafe::backends::MockProvider;
/// use imsafe::core::{AnalysisSnapshot, EngineVerdict, ProviderStatus, VerdictCategory};
///
/// let provider = MockProvider::new()
///     .then(AnalysisSnapshot::new(ProviderStatus::Queued))
///     .then(
///         AnalysisSnapshot::new(ProviderStatus::Completed)
///             .with_verdict("Acme", EngineVerdict::new("Acme", VerdictCategory::Harmless)),
///     );
/// assert_eq!(provider.fetch_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    script: RwLock<VecDeque<MockFetch>>,
    last: RwLock<Option<MockFetch>>,
    submit_failure: Option<MockFailure>,
    latency: Option<Duration>,
    max_file_size: Option<u64>,
    submit_count: AtomicU64,
    fetch_count: AtomicU64,
}

impl MockProvider {
    /// Creates a mock that accepts every submission and reports a
    /// completed analysis with no verdicts.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            script: RwLock::new(VecDeque::new()),
            last: RwLock::new(None),
            submit_failure: None,
            latency: None,
            max_file_size: None,
            submit_count: AtomicU64::new(0),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Sets the provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a snapshot to the fetch script.
    pub fn then(self, snapshot: AnalysisSnapshot) -> Self {
        self.push(MockFetch::Snapshot(snapshot));
        self
    }

    /// Appends a failing fetch to the script.
    pub fn then_fail(self, failure: MockFailure) -> Self {
        self.push(MockFetch::Fail(failure));
        self
    }

    /// Makes every submission fail.
    pub fn with_submit_failure(mut self, failure: MockFailure) -> Self {
        self.submit_failure = Some(failure);
        self
    }

    /// Sets the simulated latency for every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Overrides the maximum accepted file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = Some(size);
        self
    }

    /// Appends a scripted response (mutable version).
    pub fn push(&self, response: MockFetch) {
        self.script
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }

    /// Returns the number of submissions received.
    pub fn submit_count(&self) -> u64 {
        self.submit_count.load(Ordering::SeqCst)
    }

    /// Returns the number of fetches received.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Returns the total number of calls that would have hit the network.
    pub fn call_count(&self) -> u64 {
        self.submit_count() + self.fetch_count()
    }

    fn next_response(&self) -> MockFetch {
        let next = self
            .script
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        let mut last = self
            .last
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            // Script exhausted: repeat the final response.
            None => last.clone().unwrap_or_else(|| {
                MockFetch::Snapshot(AnalysisSnapshot::new(ProviderStatus::Completed))
            }),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, target: &ScanTarget) -> Result<AnalysisHandle, ScanError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(failure) = self.submit_failure {
            return Err(failure.into_error(&self.name));
        }

        let mut handle = AnalysisHandle::new(
            format!("mock-{}", Uuid::new_v4()),
            target.kind(),
            self.name.clone(),
        );
        if let Some(sha256) = FileHasher::new().hash_target(target) {
            handle = handle.with_sha256(sha256);
        }
        Ok(handle)
    }

    async fn fetch(&self, _handle: &AnalysisHandle) -> Result<AnalysisSnapshot, ScanError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        match self.next_response() {
            MockFetch::Snapshot(mut snapshot) => {
                snapshot.observed_at = chrono::Utc::now();
                Ok(snapshot)
            }
            MockFetch::Fail(failure) => Err(failure.into_error(&self.name)),
        }
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(crate::core::MAX_FILE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EngineVerdict, VerdictCategory};

    #[tokio::test]
    async fn test_mock_submit() {
        let provider = MockProvider::new();
        let target = ScanTarget::from_bytes(b"test data".to_vec());

        let handle = provider.submit(&target).await.unwrap();
        assert!(handle.id.starts_with("mock-"));
        assert!(handle.sha256.is_some());
        assert_eq!(provider.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_script_then_repeat_last() {
        let provider = MockProvider::new()
            .then(AnalysisSnapshot::new(ProviderStatus::Queued))
            .then(AnalysisSnapshot::new(ProviderStatus::Completed).with_verdict(
                "Acme",
                EngineVerdict::new("Acme", VerdictCategory::Malicious),
            ));
        let handle = provider
            .submit(&ScanTarget::from_url("https://example.com"))
            .await
            .unwrap();

        let first = provider.fetch(&handle).await.unwrap();
        assert_eq!(first.status, ProviderStatus::Queued);

        let second = provider.fetch(&handle).await.unwrap();
        assert_eq!(second.status, ProviderStatus::Completed);

        let third = provider.fetch(&handle).await.unwrap();
        assert_eq!(third.verdicts.len(), 1);
        assert_eq!(provider.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let provider = MockProvider::new()
            .with_submit_failure(MockFailure::Rejected)
            .then_fail(MockFailure::Parse);
        let target = ScanTarget::from_url("https://example.com");

        let err = provider.submit(&target).await.unwrap_err();
        assert!(matches!(err, ScanError::ProviderRejected { .. }));

        let handle = AnalysisHandle::new("x", target.kind(), "mock");
        let err = provider.fetch(&handle).await.unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
        assert_eq!(provider.call_count(), 2);
    }
}
