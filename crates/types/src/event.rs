//! Registration event payload broadcast to external observers.

use crate::record::{AccountId, SongRecord, WorkId};
use serde::{Deserialize, Serialize};

/// Emitted after a registration has been durably committed.
///
/// Carries the same fields the committed record does; subscribers (indexers,
/// UIs) can rebuild their view from the stream alone. Delivery guarantees are
/// the subscriber's problem, not the registry's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRegistered {
    pub registrant: AccountId,
    pub id: WorkId,
    pub title: String,
    pub creator: String,
    /// Microseconds since UNIX_EPOCH, identical to the record's timestamp.
    pub registered_at: u64,
}

impl From<&SongRecord> for WorkRegistered {
    fn from(record: &SongRecord) -> Self {
        Self {
            registrant: record.owner.clone(),
            id: record.id,
            title: record.title.clone(),
            creator: record.creator.clone(),
            registered_at: record.registered_at,
        }
    }
}
