//! Error types for the imsafe library.
//!
//! Every failure in the submit/poll workflow is one of a small set of
//! typed classes. Validation failures never reach the network; every other
//! class ends the scan session it occurred in.

use std::time::Duration;
use thiserror::Error;

/// The main error type for scan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The caller's input violates a precondition (missing field, bad URL).
    #[error("invalid scan target: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// The file exceeds the maximum size the provider accepts.
    #[error("file size {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual file size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// The provider was unreachable or answered with a non-success status.
    #[error("transport error talking to '{provider}'{}: {message}", status_suffix(*.status))]
    Transport {
        /// Name of the provider.
        provider: String,
        /// HTTP status, when a response was received at all.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The provider's response did not match the expected shape.
    #[error("unexpected response from '{provider}': {details}")]
    Parse {
        /// Name of the provider.
        provider: String,
        /// What could not be decoded.
        details: String,
    },

    /// The provider returned a structured rejection.
    #[error("'{provider}' rejected the request ({code}): {message}")]
    ProviderRejected {
        /// Name of the provider.
        provider: String,
        /// Provider error code, e.g. `BadRequestError`.
        code: String,
        /// Provider supplied message.
        message: String,
    },

    /// The poll loop hit its attempt cap or deadline before a terminal state.
    #[error("analysis '{handle_id}' did not finish after {attempts} polls ({elapsed:?})")]
    TimedOut {
        /// Handle that was being polled.
        handle_id: String,
        /// Number of fetches performed.
        attempts: u32,
        /// Wall-clock time spent polling.
        elapsed: Duration,
    },

    /// The scan session was cancelled by the caller.
    #[error("scan was cancelled")]
    Cancelled,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

fn status_suffix(status: Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl ScanError {
    /// Returns `true` if resubmitting the same target may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::TimedOut { .. })
    }

    /// Returns `true` if the error was raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::FileTooLarge { .. })
    }

    /// Returns the provider name if this error is associated with one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Transport { provider, .. }
            | Self::Parse { provider, .. }
            | Self::ProviderRejected { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Returns the generic, end-user facing message for this failure class.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "The scan request is invalid",
            Self::FileTooLarge { .. } => "File size exceeds 32MB limit",
            Self::Transport { .. } | Self::Parse { .. } | Self::ProviderRejected { .. } => {
                "Failed to analyze target"
            }
            Self::TimedOut { .. } => "Analysis is taking too long, please try again",
            Self::Cancelled => "Scan was cancelled",
            Self::Io(_) | Self::Configuration { .. } | Self::Internal { .. } => {
                "Internal server error"
            }
        }
    }

    /// Creates a `Validation` error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Creates a `Transport` error.
    pub fn transport(
        provider: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a `Parse` error.
    pub fn parse(provider: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Parse {
            provider: provider.into(),
            details: details.into(),
        }
    }

    /// Creates a `ProviderRejected` error.
    pub fn rejected(
        provider: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProviderRejected {
            provider: provider.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;
