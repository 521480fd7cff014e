//! Scan target abstraction.
//!
//! A `ScanTarget` is the artifact a user wants checked: either a file held
//! in memory or an absolute URL. Targets are validated locally before any
//! provider sees them.

use crate::core::error::ScanError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Largest file accepted for submission (32 MiB, the public API upload limit).
pub const MAX_FILE_SIZE: u64 = 32 * 1024 * 1024;

/// An artifact to be submitted to a scanning provider.
///
/// # Examples
///
/// ```rust
/// use imsafe::core::ScanTarget;
///
/// let url = ScanTarget::from_url("https://example.com/login");
/// let file = ScanTarget::from_bytes(vec![0x4D, 0x5A]).with_filename("setup.exe");
/// assert!(url.is_url());
/// assert_eq!(file.size(), Some(2));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// In-memory file contents with an optional original filename.
    File {
        /// The file data.
        data: Vec<u8>,
        /// Optional original filename.
        filename: Option<String>,
    },

    /// An absolute URL.
    Url(String),
}

/// The kind of a scan target, carried on the analysis handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A submitted file.
    File,
    /// A submitted URL.
    Url,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Url => write!(f, "url"),
        }
    }
}

impl fmt::Debug for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { data, filename } => f
                .debug_struct("File")
                .field("data_len", &data.len())
                .field("filename", filename)
                .finish(),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

impl ScanTarget {
    /// Creates a file target from bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::File {
            data: data.into(),
            filename: None,
        }
    }

    /// Creates a URL target.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Reads a file target from disk, keeping the file name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        Ok(Self::File { data, filename })
    }

    /// Sets the filename for file targets.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let Self::File { filename, .. } = &mut self {
            *filename = Some(name.into());
        }
        self
    }

    /// Returns the kind of this target.
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::File { .. } => TargetKind::File,
            Self::Url(_) => TargetKind::Url,
        }
    }

    /// Returns `true` if this is a file target.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// Returns `true` if this is a URL target.
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Returns the filename, if known.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::File { filename, .. } => filename.as_deref(),
            Self::Url(_) => None,
        }
    }

    /// Returns the payload size for file targets.
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::File { data, .. } => Some(data.len() as u64),
            Self::Url(_) => None,
        }
    }

    /// Returns the file bytes, if this is a file target.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::File { data, .. } => Some(data),
            Self::Url(_) => None,
        }
    }

    /// Returns the URL, if this is a URL target.
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::File { .. } => None,
        }
    }

    /// Checks the target against local preconditions.
    ///
    /// Files must be non-empty and at most `max_size` bytes. URLs must be
    /// absolute `http` or `https` URLs with a host.
    pub fn validate(&self, max_size: u64) -> Result<(), ScanError> {
        match self {
            Self::File { data, .. } => {
                let size = data.len() as u64;
                if size == 0 {
                    return Err(ScanError::validation("file is empty"));
                }
                if size > max_size {
                    return Err(ScanError::FileTooLarge {
                        size,
                        max: max_size,
                    });
                }
                Ok(())
            }
            Self::Url(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Err(ScanError::validation("URL is required"));
                }
                let parsed = url::Url::parse(raw)
                    .map_err(|e| ScanError::validation(format!("invalid URL: {}", e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ScanError::validation(format!(
                        "unsupported URL scheme '{}'",
                        parsed.scheme()
                    )));
                }
                if parsed.host_str().is_none() {
                    return Err(ScanError::validation("URL has no host"));
                }
                Ok(())
            }
        }
    }
}

impl From<Vec<u8>> for ScanTarget {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&[u8]> for ScanTarget {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data.to_vec())
    }
}
