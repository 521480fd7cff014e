//! Content hashing for submitted files.
//!
//! The SHA-256 of a file is recorded on its analysis handle so callers can
//! link to the provider's file report without another request.

use crate::core::input::ScanTarget;

use sha2::{Digest, Sha256};

/// Computes content hashes for scan targets.
///
/// # Examples
///
/// ```rust
/// use imsafe::core::{FileHasher, ScanTarget};
///
/// let hasher = FileHasher::new();
/// let target = ScanTarget::from_bytes(b"hello world".to_vec());
/// assert_eq!(
///     hasher.hash_target(&target).as_deref(),
///     Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"),
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHasher;

impl FileHasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Self
    }

    /// Returns the lowercase hex SHA-256 of `data`.
    pub fn sha256(&self, data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    /// Hashes a file target. URL targets have no content hash.
    pub fn hash_target(&self, target: &ScanTarget) -> Option<String> {
        target.as_bytes().map(|data| self.sha256(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let hasher = FileHasher::new();
        assert_eq!(
            hasher.sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_deterministic() {
        let hasher = FileHasher::new();
        assert_eq!(hasher.sha256(b"data"), hasher.sha256(b"data"));
        assert_ne!(hasher.sha256(b"data1"), hasher.sha256(b"data2"));
    }

    #[test]
    fn test_url_has_no_hash() {
        let hasher = FileHasher::new();
        let target = ScanTarget::from_url("https://example.com");
        assert_eq!(hasher.hash_target(&target), None);
    }
}
