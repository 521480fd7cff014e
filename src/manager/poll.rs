//! Poll scheduling configuration.

use std::time::Duration;

/// Configuration for the poll loop.
///
/// Polls run on a fixed interval. Scheduled polls while an analysis is
/// queued or in progress are not retries: a failed fetch always ends the
/// session.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive fetches.
    pub interval: Duration,

    /// Maximum number of fetches per session, if bounded.
    pub max_attempts: Option<u32>,

    /// Maximum wall-clock time spent polling, if bounded.
    pub max_duration: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: Some(120),
            max_duration: Some(Duration::from_secs(600)),
        }
    }
}

impl PollConfig {
    /// Creates a new poll configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Polls forever until the provider reaches a terminal state.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            max_duration: None,
            ..Self::default()
        }
    }

    /// Sets the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the maximum number of fetches.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Sets the polling deadline.
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Returns whether another fetch may be scheduled.
    ///
    /// `attempts` is the number of fetches already performed and `elapsed`
    /// the time since the first one started. The next fetch would start one
    /// interval from now, so it must still fit inside the deadline.
    pub fn allows_another(&self, attempts: u32, elapsed: Duration) -> bool {
        if let Some(max) = self.max_attempts {
            if attempts >= max {
                return false;
            }
        }
        if let Some(max) = self.max_duration {
            if elapsed + self.interval > max {
                return false;
            }
        }
        true
    }
}
