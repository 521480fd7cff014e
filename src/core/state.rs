//! Scan session state machine.
//!
//! A session only ever moves forward: `Queued` and `InProgress` follow the
//! provider, and every other state is terminal and absorbs all further
//! events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one analysis, as seen by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// The provider has accepted the artifact but not started on it.
    Queued,
    /// Engines are running.
    InProgress,
    /// The provider finished the analysis.
    Completed,
    /// A fetch failed with a transport or parse error.
    Failed,
    /// The poll loop gave up before the provider finished.
    TimedOut,
    /// The caller lost interest.
    Cancelled,
}

/// Pipeline status as reported by the provider for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Waiting in the provider's queue.
    Queued,
    /// Engines are running.
    InProgress,
    /// All engines have reported.
    Completed,
}

impl ProviderStatus {
    /// Maps a provider status string.
    ///
    /// Returns `None` for strings this library does not recognize.
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(Self::Queued),
            "in-progress" | "in_progress" | "running" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Something that happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    /// A fetch succeeded and reported this status.
    Observed(ProviderStatus),
    /// A fetch failed.
    FetchFailed,
    /// The attempt cap or deadline was reached.
    DeadlineExceeded,
    /// The caller cancelled the session.
    Cancelled,
}

impl ScanState {
    /// Applies an event and returns the next state.
    ///
    /// Terminal states are returned unchanged. A provider that reports
    /// `Queued` after `InProgress` does not move the session backwards.
    pub fn advance(self, event: PollEvent) -> ScanState {
        if self.is_terminal() {
            return self;
        }

        match event {
            PollEvent::Observed(ProviderStatus::Completed) => Self::Completed,
            PollEvent::Observed(ProviderStatus::InProgress) => Self::InProgress,
            PollEvent::Observed(ProviderStatus::Queued) => match self {
                Self::InProgress => Self::InProgress,
                _ => Self::Queued,
            },
            PollEvent::FetchFailed => Self::Failed,
            PollEvent::DeadlineExceeded => Self::TimedOut,
            PollEvent::Cancelled => Self::Cancelled,
        }
    }

    /// Returns `true` if no further transition can leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    /// Returns `true` if another poll should be scheduled.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    /// Returns `true` if the user can sensibly resubmit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ProviderStatus> for ScanState {
    fn from(status: ProviderStatus) -> Self {
        match status {
            ProviderStatus::Queued => Self::Queued,
            ProviderStatus::InProgress => Self::InProgress,
            ProviderStatus::Completed => Self::Completed,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
