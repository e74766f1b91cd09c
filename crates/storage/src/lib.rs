//! Durable registry state.
//!
//! The registry core is storage-agnostic: it talks to a [`RegistryStore`]
//! and never sees sled directly. [`SledStore`] is the production backend;
//! [`MemoryStore`] backs tests.
//!
//! A registration commits three facts at once: the record, its fingerprint,
//! and the advanced identifier counter. [`SledStore`] applies them in a
//! single multi-tree transaction so a crash mid-commit can never leave a
//! fingerprint without its record or vice versa.

use anyhow::Result;
use cantus_types::{AccountId, Fingerprint, SongRecord, WorkId};
use parking_lot::RwLock;
use sled::transaction::ConflictableTransactionError;
use sled::{Db, Transactional, Tree};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Fingerprint already registered: {0}")]
    FingerprintExists(Fingerprint),
    #[error("Identifier counter mismatch: expected {expected}, got {got}")]
    CounterMismatch { expected: WorkId, got: WorkId },
}

/// Abstract registry store.
///
/// `commit_registration` must be all-or-nothing: either the record, its
/// fingerprint, and the advanced counter all become durable, or none do.
/// Reads must never observe a partially applied commit.
pub trait RegistryStore: Send + Sync {
    /// Membership test against the registered-fingerprint set.
    fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// Point lookup by identifier.
    fn get_record(&self, id: WorkId) -> Result<Option<SongRecord>>;

    /// The identifier the next successful registration will receive.
    fn next_work_id(&self) -> Result<WorkId>;

    /// Atomically persist a registration. `record.id` must equal the current
    /// counter value; the counter advances past it as part of the commit.
    fn commit_registration(&self, record: &SongRecord, fingerprint: &Fingerprint) -> Result<()>;

    /// Identifiers of all works registered by `owner`, in allocation order.
    fn works_by_owner(&self, owner: &AccountId) -> Result<Vec<WorkId>>;

    /// Number of registered works.
    fn work_count(&self) -> Result<u64>;

    /// Block until previously committed state is durable.
    fn flush(&self) -> Result<()>;
}

const NEXT_WORK_ID_KEY: &[u8] = b"next_work_id";

/// Sled-backed implementation
pub struct SledStore {
    db: Db,
    records: Tree,
    fingerprints: Tree,
    meta: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let records = db.open_tree("records")?;
        let fingerprints = db.open_tree("fingerprints")?;
        let meta = db.open_tree("meta")?;

        let store = Self {
            db,
            records,
            fingerprints,
            meta,
        };
        tracing::info!(
            next_id = store.next_work_id()?.as_u64(),
            works = store.work_count()?,
            "opened registry store"
        );
        Ok(store)
    }

    fn decode_next_id(value: Option<sled::IVec>) -> WorkId {
        value
            .and_then(|v| <[u8; 8]>::try_from(v.as_ref()).ok())
            .map(WorkId::from_key)
            .unwrap_or(WorkId::FIRST)
    }
}

impl RegistryStore for SledStore {
    fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.fingerprints.contains_key(fingerprint.as_bytes())?)
    }

    fn get_record(&self, id: WorkId) -> Result<Option<SongRecord>> {
        self.records
            .get(id.to_key())?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn next_work_id(&self) -> Result<WorkId> {
        Ok(Self::decode_next_id(self.meta.get(NEXT_WORK_ID_KEY)?))
    }

    fn commit_registration(&self, record: &SongRecord, fingerprint: &Fingerprint) -> Result<()> {
        let record_value = serde_json::to_vec(record)?;

        (&self.records, &self.fingerprints, &self.meta).transaction(
            |(records, fingerprints, meta)| {
                let expected = Self::decode_next_id(meta.get(NEXT_WORK_ID_KEY)?);
                if record.id != expected {
                    return Err(ConflictableTransactionError::Abort(
                        StorageError::CounterMismatch {
                            expected,
                            got: record.id,
                        },
                    ));
                }
                if fingerprints.get(fingerprint.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        StorageError::FingerprintExists(*fingerprint),
                    ));
                }

                records.insert(&record.id.to_key(), record_value.as_slice())?;
                fingerprints.insert(fingerprint.as_bytes(), &record.id.to_key())?;
                meta.insert(NEXT_WORK_ID_KEY, &record.id.next().to_key())?;
                Ok(())
            },
        )
        .map_err(|err: sled::transaction::TransactionError<StorageError>| match err {
            sled::transaction::TransactionError::Abort(aborted) => anyhow::Error::from(aborted),
            sled::transaction::TransactionError::Storage(db_err) => anyhow::Error::from(db_err),
        })?;

        self.db.flush()?;
        Ok(())
    }

    // Full scan of the records tree; keys iterate in allocation order.
    // Fine at registry scale, revisit with a reverse index if owners ever
    // hold tens of thousands of works.
    fn works_by_owner(&self, owner: &AccountId) -> Result<Vec<WorkId>> {
        let mut works = Vec::new();
        for item in self.records.iter() {
            let (_, value) = item?;
            let record: SongRecord = serde_json::from_slice(&value)?;
            if &record.owner == owner {
                works.push(record.id);
            }
        }
        Ok(works)
    }

    fn work_count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    records: BTreeMap<WorkId, SongRecord>,
    fingerprints: HashMap<Fingerprint, WorkId>,
    next_id: Option<WorkId>,
}

impl MemoryInner {
    fn next_id(&self) -> WorkId {
        self.next_id.unwrap_or(WorkId::FIRST)
    }
}

/// In-memory testing backend
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryStore {
    fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.inner.read().fingerprints.contains_key(fingerprint))
    }

    fn get_record(&self, id: WorkId) -> Result<Option<SongRecord>> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    fn next_work_id(&self) -> Result<WorkId> {
        Ok(self.inner.read().next_id())
    }

    fn commit_registration(&self, record: &SongRecord, fingerprint: &Fingerprint) -> Result<()> {
        let mut inner = self.inner.write();
        let expected = inner.next_id();
        if record.id != expected {
            return Err(StorageError::CounterMismatch {
                expected,
                got: record.id,
            }
            .into());
        }
        if inner.fingerprints.contains_key(fingerprint) {
            return Err(StorageError::FingerprintExists(*fingerprint).into());
        }

        inner.records.insert(record.id, record.clone());
        inner.fingerprints.insert(*fingerprint, record.id);
        inner.next_id = Some(record.id.next());
        Ok(())
    }

    fn works_by_owner(&self, owner: &AccountId) -> Result<Vec<WorkId>> {
        Ok(self
            .inner
            .read()
            .records
            .values()
            .filter(|record| &record.owner == owner)
            .map(|record| record.id)
            .collect())
    }

    fn work_count(&self) -> Result<u64> {
        Ok(self.inner.read().records.len() as u64)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
