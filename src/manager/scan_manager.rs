//! The main scan manager implementation.

use crate::audit;
use crate::core::{
    AnalysisHandle, AnalysisSnapshot, ArcProvider, PollEvent, ScanError, ScanProvider, ScanState,
    ScanTarget, VerdictMap, MAX_FILE_SIZE,
};
use crate::manager::poll::PollConfig;
use crate::manager::session::{ScanSession, ScanUpdate};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Configuration for the scan manager.
#[derive(Debug, Clone)]
pub struct ScanManagerConfig {
    /// Poll scheduling.
    pub poll: PollConfig,

    /// Maximum file size to accept. The provider's own limit also applies.
    pub max_file_size: u64,
}

impl Default for ScanManagerConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl ScanManagerConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll configuration.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Sets the maximum file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }
}

/// Builder for creating a `ScanManager`.
pub struct ScanManagerBuilder {
    provider: Option<ArcProvider>,
    config: ScanManagerConfig,
}

impl ScanManagerBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            provider: None,
            config: ScanManagerConfig::default(),
        }
    }

    /// Sets the scanning provider.
    pub fn with_provider<P: ScanProvider + 'static>(mut self, provider: P) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Sets a provider wrapped in an Arc.
    pub fn with_arc_provider(mut self, provider: ArcProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ScanManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the poll configuration.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.config.poll = poll;
        self
    }

    /// Builds the scan manager.
    pub fn build(self) -> Result<ScanManager, ScanError> {
        let provider = self
            .provider
            .ok_or_else(|| ScanError::configuration("A scan provider is required"))?;

        Ok(ScanManager {
            provider,
            config: self.config,
        })
    }
}

impl Default for ScanManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives submissions and poll loops against one provider.
///
/// The manager holds no per-scan state; any number of sessions may run
/// concurrently through the same instance.
pub struct ScanManager {
    provider: ArcProvider,
    config: ScanManagerConfig,
}

impl ScanManager {
    /// Creates a new builder.
    pub fn builder() -> ScanManagerBuilder {
        ScanManagerBuilder::new()
    }

    /// Returns the provider.
    pub fn provider(&self) -> &ArcProvider {
        &self.provider
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &ScanManagerConfig {
        &self.config
    }

    /// Returns the file size limit in force.
    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size.min(self.provider.max_file_size())
    }

    /// Validates a target and submits it.
    ///
    /// Invalid targets are rejected without contacting the provider.
    pub async fn submit(&self, target: &ScanTarget) -> Result<AnalysisHandle, ScanError> {
        if let Err(e) = target.validate(self.max_file_size()) {
            tracing::info!(
                kind = %target.kind(),
                size = ?target.size(),
                error = %e,
                "Rejected scan target"
            );
            return Err(e);
        }

        let handle = match self.provider.submit(target).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    kind = %target.kind(),
                    error = %e,
                    "Submission failed"
                );
                return Err(e);
            }
        };

        audit::emit_scan_submitted(&handle, target);
        Ok(handle)
    }

    /// Performs a single fetch of an analysis.
    pub async fn fetch(&self, handle: &AnalysisHandle) -> Result<AnalysisSnapshot, ScanError> {
        self.provider.fetch(handle).await.map_err(|e| {
            tracing::warn!(
                analysis_id = %handle.id,
                provider = self.provider.name(),
                error = %e,
                "Fetch failed"
            );
            e
        })
    }

    /// Polls an analysis until it reaches a terminal state.
    ///
    /// The first fetch happens immediately. While the analysis is queued
    /// or in progress the next fetch is scheduled one interval later, and
    /// every fetch result is passed to `on_update` in order. A fetch error
    /// ends the loop in `Failed`; exhausting the poll budget ends it in
    /// `TimedOut`. After `cancel` fires nothing more is passed to
    /// `on_update` and any in-flight fetch is dropped.
    pub async fn poll_until_terminal<F>(
        &self,
        handle: &AnalysisHandle,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> Result<ScanUpdate, ScanError>
    where
        F: FnMut(&ScanUpdate) + Send,
    {
        let started = Instant::now();
        let mut state = ScanState::Queued;
        let mut verdicts = VerdictMap::new();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(handle, attempt - 1)),
                fetched = self.provider.fetch(handle) => fetched,
            };
            if cancel.is_cancelled() {
                return Err(self.cancelled(handle, attempt));
            }

            let (update, failure) = match fetched {
                Ok(snapshot) => {
                    state = state.advance(PollEvent::Observed(snapshot.status));
                    verdicts = snapshot.verdicts;
                    (self.make_update(handle, attempt, state, &verdicts, None), None)
                }
                Err(e) => {
                    state = state.advance(PollEvent::FetchFailed);
                    tracing::warn!(
                        analysis_id = %handle.id,
                        attempt = attempt,
                        error = %e,
                        "Poll failed, ending session"
                    );
                    let update =
                        self.make_update(handle, attempt, state, &verdicts, Some(e.to_string()));
                    (update, Some(e))
                }
            };

            audit::emit_poll_observed(&update);
            on_update(&update);

            if let Some(e) = failure {
                audit::emit_scan_finished(handle, &update, started.elapsed());
                return Err(e);
            }
            if state.is_terminal() {
                audit::emit_scan_finished(handle, &update, started.elapsed());
                return Ok(update);
            }

            if !self.config.poll.allows_another(attempt, started.elapsed()) {
                state = state.advance(PollEvent::DeadlineExceeded);
                let error = ScanError::TimedOut {
                    handle_id: handle.id.clone(),
                    attempts: attempt,
                    elapsed: started.elapsed(),
                };
                let update =
                    self.make_update(handle, attempt, state, &verdicts, Some(error.to_string()));
                audit::emit_poll_observed(&update);
                on_update(&update);
                audit::emit_scan_finished(handle, &update, started.elapsed());
                return Err(error);
            }

            tracing::debug!(
                analysis_id = %handle.id,
                attempt = attempt,
                state = %state,
                delay_ms = self.config.poll.interval.as_millis() as u64,
                "Scheduling next poll"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(handle, attempt)),
                _ = tokio::time::sleep(self.config.poll.interval) => {}
            }
        }
    }

    /// Spawns a poll loop for `handle` and returns its session.
    ///
    /// Each call starts an independent session with its own cancellation
    /// token; sessions never share state.
    pub fn watch(self: &Arc<Self>, handle: AnalysisHandle) -> ScanSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let manager = Arc::clone(self);
        let task_handle = handle.clone();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            manager
                .poll_until_terminal(&task_handle, &task_cancel, |update| {
                    // The receiver may already be gone; that is cancellation.
                    let _ = tx.send(update.clone());
                })
                .await
        });

        ScanSession::new(handle, rx, cancel, task)
    }

    /// Submits a target and starts polling it in the background.
    pub async fn scan(self: &Arc<Self>, target: &ScanTarget) -> Result<ScanSession, ScanError> {
        let handle = self.submit(target).await?;
        Ok(self.watch(handle))
    }

    fn make_update(
        &self,
        handle: &AnalysisHandle,
        attempt: u32,
        state: ScanState,
        verdicts: &VerdictMap,
        error: Option<String>,
    ) -> ScanUpdate {
        ScanUpdate {
            handle_id: handle.id.clone(),
            attempt,
            state,
            summary: crate::core::aggregate(verdicts),
            verdicts: verdicts.clone(),
            error,
            observed_at: chrono::Utc::now(),
        }
    }

    fn cancelled(&self, handle: &AnalysisHandle, attempts: u32) -> ScanError {
        tracing::debug!(
            analysis_id = %handle.id,
            attempts = attempts,
            "Poll loop stopped after cancellation"
        );
        ScanError::Cancelled
    }
}

impl std::fmt::Debug for ScanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanManager")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}
