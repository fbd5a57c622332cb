//! Content fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-256 digest of the raw UTF-8
//! bytes of a document. It is the only criterion the sync pipeline uses
//! to decide whether content has changed.

use sha2::{Digest, Sha256};

/// Compute the fingerprint of `content`.
///
/// ```rust
/// use kbsync_core::fingerprint::fingerprint;
///
/// let fp = fingerprint("hello");
/// assert_eq!(fp.len(), 64);
/// assert_eq!(fp, fingerprint("hello"));
/// ```
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(fingerprint("hello #x"), fingerprint("hello #x"));
    }

    #[test]
    fn test_distinct_content_distinct_fingerprint() {
        assert_ne!(fingerprint("world"), fingerprint("world!"));
        assert_ne!(fingerprint(""), fingerprint(" "));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
