//! Work registry implementation
//!
//! Maintains the bijection between content fingerprints and registered
//! records, allocates identifiers, and broadcasts registration events.

use crate::errors::*;
use cantus_storage::RegistryStore;
use cantus_types::{AccountId, Clock, Fingerprint, SongRecord, WorkId, WorkRegistered};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Work Registry
///
/// The only component that mutates registry state. A registration either
/// fully happens (record stored, fingerprint registered, counter advanced,
/// event emitted) or leaves everything untouched.
///
/// Empty titles and creator names are accepted: the fingerprint is
/// well-defined for them and the registry deliberately imposes no content
/// policy of its own.
pub struct WorkRegistry {
    store: Arc<dyn RegistryStore>,
    clock: Arc<dyn Clock>,
    /// Serializes the check-allocate-commit sequence in [`register`].
    /// Without it two concurrent registrations of the same work could both
    /// pass the fingerprint check before either inserts.
    ///
    /// [`register`]: WorkRegistry::register
    write_lock: Mutex<()>,
    events: broadcast::Sender<WorkRegistered>,
}

impl WorkRegistry {
    /// Create a registry over an existing store.
    pub fn new(store: Arc<dyn RegistryStore>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
            events,
        }
    }

    /// Register a new work and return its freshly allocated identifier.
    ///
    /// Fails with [`RegistryError::DuplicateWork`] if a work with the same
    /// `(title, creator)` fingerprint is already registered, regardless of
    /// `metadata_ref` or registrant; no state changes on that path.
    /// The registration timestamp comes from the registry's clock, never
    /// from the caller.
    pub fn register(
        &self,
        title: &str,
        creator: &str,
        metadata_ref: &str,
        registrant: AccountId,
    ) -> Result<WorkId> {
        let fingerprint = Fingerprint::compute(title, creator);

        let record = {
            let _write = self.write_lock.lock();

            if self.store.contains_fingerprint(&fingerprint)? {
                return Err(RegistryError::DuplicateWork {
                    title: title.to_string(),
                    creator: creator.to_string(),
                });
            }

            let record = SongRecord {
                id: self.store.next_work_id()?,
                title: title.to_string(),
                creator: creator.to_string(),
                registered_at: self.clock.now_us(),
                owner: registrant,
                metadata_ref: metadata_ref.to_string(),
            };
            self.store.commit_registration(&record, &fingerprint)?;
            record
        };

        tracing::info!(
            id = record.id.as_u64(),
            fingerprint = %fingerprint,
            owner = %record.owner,
            "registered work"
        );

        // Emitted only after the durable commit; nobody listening is fine.
        let _ = self.events.send(WorkRegistered::from(&record));

        Ok(record.id)
    }

    /// Look up a registered work by identifier.
    ///
    /// Returns the full record; fails with [`RegistryError::NotFound`] for
    /// identifier 0 and any identifier never allocated. Pure read.
    pub fn lookup(&self, id: WorkId) -> Result<SongRecord> {
        self.store
            .get_record(id)?
            .ok_or(RegistryError::NotFound { id })
    }

    /// Identifiers of every work registered by `owner`, in allocation order.
    pub fn works_by_owner(&self, owner: &AccountId) -> Result<Vec<WorkId>> {
        Ok(self.store.works_by_owner(owner)?)
    }

    /// Number of registered works.
    pub fn work_count(&self) -> Result<u64> {
        Ok(self.store.work_count()?)
    }

    /// Subscribe to registration events.
    ///
    /// Only registrations committed after the subscription are delivered;
    /// slow subscribers may observe lagged-receiver errors and are expected
    /// to resynchronize via [`lookup`](WorkRegistry::lookup).
    pub fn subscribe(&self) -> broadcast::Receiver<WorkRegistered> {
        self.events.subscribe()
    }

    /// Flush underlying storage; called on shutdown.
    pub fn flush(&self) -> Result<()> {
        Ok(self.store.flush()?)
    }
}
