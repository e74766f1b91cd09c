//! Work identifiers, owning principals, and the registered song record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered work.
///
/// Allocated strictly increasing, starting at 1. Identifier 0 is reserved
/// and never allocated, so it can stand in for "no such work" in external
/// protocols that lack an option type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct WorkId(pub u64);

impl WorkId {
    /// Reserved "not found" sentinel; never allocated by the registry.
    pub const UNALLOCATED: WorkId = WorkId(0);

    /// First identifier the registry hands out.
    pub const FIRST: WorkId = WorkId(1);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The identifier allocated after this one.
    pub fn next(&self) -> WorkId {
        WorkId(self.0.saturating_add(1))
    }

    /// Big-endian key encoding, so sled iterates records in allocation order.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(key: [u8; 8]) -> Self {
        WorkId(u64::from_be_bytes(key))
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for WorkId {
    fn from(id: u64) -> Self {
        WorkId(id)
    }
}

/// Opaque principal that registered a work.
///
/// Supplied by the identity layer and trusted as given; the registry never
/// parses or validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId(id.to_string())
    }
}

/// An immutable registered-work entry.
///
/// Created once by a successful registration and never updated or deleted.
/// `metadata_ref` is an opaque pointer to externally stored content (for
/// example an `ipfs://` URI); the registry stores it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: WorkId,
    pub title: String,
    pub creator: String,
    /// Registration time in microseconds since UNIX_EPOCH.
    pub registered_at: u64,
    pub owner: AccountId,
    pub metadata_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_id_key_round_trip_preserves_order() {
        let ids = [WorkId(1), WorkId(2), WorkId(255), WorkId(256), WorkId(u64::MAX)];
        let mut keys: Vec<[u8; 8]> = ids.iter().map(|id| id.to_key()).collect();
        keys.sort();
        let decoded: Vec<WorkId> = keys.into_iter().map(WorkId::from_key).collect();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn work_id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&WorkId(42)).unwrap();
        assert_eq!(json, "42");
        let id: WorkId = serde_json::from_str("42").unwrap();
        assert_eq!(id, WorkId(42));
    }

    #[test]
    fn song_record_json_round_trip() {
        let record = SongRecord {
            id: WorkId(1),
            title: "Midnight".into(),
            creator: "Jane Doe".into(),
            registered_at: 1_700_000_000_000_000,
            owner: AccountId::from("acct:jane"),
            metadata_ref: "ipfs://abc123".into(),
        };
        let json = serde_json::to_vec(&record).unwrap();
        let back: SongRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, record);
    }
}
