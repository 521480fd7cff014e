//! Background scan sessions.
//!
//! A `ScanSession` owns one spawned poll loop. Updates arrive in the order
//! the fetches completed; once the session is cancelled or dropped no
//! further update is handed out and the loop stops at its next await.

use crate::core::{AnalysisHandle, ScanError, ScanState, ScanSummary, VerdictMap};

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One state notification from the poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanUpdate {
    /// Analysis the update belongs to.
    pub handle_id: String,

    /// 1-based fetch number that produced this update.
    pub attempt: u32,

    /// Session state after this fetch.
    pub state: ScanState,

    /// Full verdict mapping from the latest successful fetch.
    pub verdicts: VerdictMap,

    /// Summary of `verdicts`.
    pub summary: ScanSummary,

    /// Failure description for `Failed` and `TimedOut` updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the update was produced.
    pub observed_at: DateTime<Utc>,
}

impl ScanUpdate {
    /// Returns `true` if this is the last update of its session.
    pub fn is_final(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Handle to a running poll loop.
///
/// Dropping the session cancels it.
#[derive(Debug)]
pub struct ScanSession {
    handle: AnalysisHandle,
    updates: mpsc::UnboundedReceiver<ScanUpdate>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<ScanUpdate, ScanError>>>,
    latest: Option<ScanUpdate>,
}

impl ScanSession {
    pub(crate) fn new(
        handle: AnalysisHandle,
        updates: mpsc::UnboundedReceiver<ScanUpdate>,
        cancel: CancellationToken,
        task: JoinHandle<Result<ScanUpdate, ScanError>>,
    ) -> Self {
        Self {
            handle,
            updates,
            cancel,
            task: Some(task),
            latest: None,
        }
    }

    /// Returns the analysis handle being polled.
    pub fn handle(&self) -> &AnalysisHandle {
        &self.handle
    }

    /// Returns the analysis id.
    pub fn id(&self) -> &str {
        &self.handle.id
    }

    /// Returns the most recent update handed out by [`next_update`](Self::next_update).
    pub fn latest(&self) -> Option<&ScanUpdate> {
        self.latest.as_ref()
    }

    /// Returns `true` if the session was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the session. No update is delivered after this returns.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(analysis_id = %self.handle.id, "Scan session cancelled");
        }
        self.cancel.cancel();
    }

    /// Waits for the next update.
    ///
    /// Returns `None` after the final update or once the session is
    /// cancelled, even if the loop had already queued more.
    pub async fn next_update(&mut self) -> Option<ScanUpdate> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let update = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            update = self.updates.recv() => update,
        };

        if self.cancel.is_cancelled() {
            return None;
        }
        if let Some(update) = &update {
            self.latest = Some(update.clone());
        }
        update
    }

    /// Converts the session into a stream of updates.
    ///
    /// The stream ends after the final update. Dropping it cancels the
    /// session.
    pub fn into_stream(self) -> impl Stream<Item = ScanUpdate> + Send {
        stream::unfold(self, |mut session| async move {
            let update = session.next_update().await?;
            Some((update, session))
        })
    }

    /// Waits for the session to finish.
    ///
    /// Returns the final update for `Completed`. Failures return the error
    /// that ended the session: the fetch error for `Failed`,
    /// `ScanError::TimedOut` and `ScanError::Cancelled` otherwise.
    pub async fn wait(mut self) -> Result<ScanUpdate, ScanError> {
        let task = self
            .task
            .take()
            .ok_or_else(|| ScanError::internal("scan session already awaited"))?;

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ScanError::Cancelled),
            Err(e) => Err(ScanError::internal(format!("poll task panicked: {}", e))),
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
