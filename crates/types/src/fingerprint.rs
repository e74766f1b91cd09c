//! Content fingerprints for duplicate detection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain separator so work fingerprints can never collide with other
/// SHA-256 uses in the system.
const FINGERPRINT_DOMAIN: &[u8] = b"CANTUS_WORK_V1";

/// Deterministic digest of a work's `(title, creator)` pair.
///
/// Used only as a duplicate-detection key. Each field is length-prefixed
/// before hashing, so `("ab", "c")` and `("a", "bc")` produce different
/// fingerprints even though their concatenations are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of a `(title, creator)` pair.
    pub fn compute(title: &str, creator: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN);
        hasher.update((title.len() as u64).to_le_bytes());
        hasher.update(title.as_bytes());
        hasher.update((creator.len() as u64).to_le_bytes());
        hasher.update(creator.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, used for storage keys and API responses.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Fingerprint::compute("Midnight", "Jane Doe");
        let b = Fingerprint::compute("Midnight", "Jane Doe");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_per_field() {
        let base = Fingerprint::compute("Midnight", "Jane Doe");
        assert_ne!(base, Fingerprint::compute("Daylight", "Jane Doe"));
        assert_ne!(base, Fingerprint::compute("Midnight", "John Doe"));
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        assert_ne!(
            Fingerprint::compute("A", "BC"),
            Fingerprint::compute("AB", "C")
        );
        assert_ne!(
            Fingerprint::compute("ab", "c"),
            Fingerprint::compute("a", "bc")
        );
    }

    #[test]
    fn empty_fields_are_well_defined() {
        let empty = Fingerprint::compute("", "");
        assert_ne!(empty, Fingerprint::compute("", "x"));
        assert_ne!(empty, Fingerprint::compute("x", ""));
        assert_ne!(
            Fingerprint::compute("", "x"),
            Fingerprint::compute("x", "")
        );
    }

    #[test]
    fn hex_rendering_is_64_chars() {
        let fp = Fingerprint::compute("Midnight", "Jane Doe");
        assert_eq!(fp.to_hex().len(), 64);
        assert_eq!(fp.to_string(), fp.to_hex());
    }
}
