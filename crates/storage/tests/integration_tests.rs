//! Integration tests for registry storage backends (sled and in-memory).
//! Tests registration commits, point lookups, the identifier counter,
//! the owner index, and durability across a database reopen.

use cantus_storage::{MemoryStore, RegistryStore, SledStore, StorageError};
use cantus_types::{AccountId, Fingerprint, SongRecord, WorkId};
use tempfile::TempDir;

fn test_record(id: u64, title: &str, creator: &str, owner: &str) -> (SongRecord, Fingerprint) {
    let record = SongRecord {
        id: WorkId(id),
        title: title.to_string(),
        creator: creator.to_string(),
        registered_at: 1_700_000_000_000_000 + id,
        owner: AccountId::from(owner),
        metadata_ref: format!("ipfs://meta-{id}"),
    };
    let fingerprint = Fingerprint::compute(title, creator);
    (record, fingerprint)
}

fn assert_store_behaviour(store: &dyn RegistryStore) {
    assert_eq!(store.next_work_id().unwrap(), WorkId::FIRST);
    assert_eq!(store.work_count().unwrap(), 0);
    assert!(store.get_record(WorkId(1)).unwrap().is_none());

    let (record, fingerprint) = test_record(1, "Midnight", "Jane Doe", "acct:jane");
    assert!(!store.contains_fingerprint(&fingerprint).unwrap());

    store.commit_registration(&record, &fingerprint).unwrap();

    assert!(store.contains_fingerprint(&fingerprint).unwrap());
    assert_eq!(store.get_record(WorkId(1)).unwrap().unwrap(), record);
    assert_eq!(store.next_work_id().unwrap(), WorkId(2));
    assert_eq!(store.work_count().unwrap(), 1);
    assert_eq!(
        store.works_by_owner(&AccountId::from("acct:jane")).unwrap(),
        vec![WorkId(1)]
    );
    assert!(store
        .works_by_owner(&AccountId::from("acct:nobody"))
        .unwrap()
        .is_empty());
}

#[test]
fn sled_store_basic_flow() {
    let dir = TempDir::new().unwrap();
    let store = SledStore::open(dir.path()).unwrap();
    assert_store_behaviour(&store);
}

#[test]
fn memory_store_basic_flow() {
    let store = MemoryStore::new();
    assert_store_behaviour(&store);
}

#[test]
fn sled_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (record, fingerprint) = test_record(1, "Midnight", "Jane Doe", "acct:jane");

    {
        let store = SledStore::open(dir.path()).unwrap();
        store.commit_registration(&record, &fingerprint).unwrap();
        store.flush().unwrap();
    }

    let store = SledStore::open(dir.path()).unwrap();
    assert_eq!(store.get_record(WorkId(1)).unwrap().unwrap(), record);
    assert!(store.contains_fingerprint(&fingerprint).unwrap());
    assert_eq!(store.next_work_id().unwrap(), WorkId(2));
    assert_eq!(
        store.works_by_owner(&AccountId::from("acct:jane")).unwrap(),
        vec![WorkId(1)]
    );
}

#[test]
fn counter_mismatch_commits_nothing() {
    let dir = TempDir::new().unwrap();
    let store = SledStore::open(dir.path()).unwrap();

    // Counter is at 1; a record claiming id 5 must be refused outright.
    let (record, fingerprint) = test_record(5, "Midnight", "Jane Doe", "acct:jane");
    let err = store.commit_registration(&record, &fingerprint).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::CounterMismatch { .. })
    ));

    assert_eq!(store.next_work_id().unwrap(), WorkId::FIRST);
    assert_eq!(store.work_count().unwrap(), 0);
    assert!(!store.contains_fingerprint(&fingerprint).unwrap());
}

#[test]
fn duplicate_fingerprint_commits_nothing() {
    let dir = TempDir::new().unwrap();
    let store = SledStore::open(dir.path()).unwrap();

    let (first, fingerprint) = test_record(1, "Midnight", "Jane Doe", "acct:jane");
    store.commit_registration(&first, &fingerprint).unwrap();

    // Same (title, creator), different metadata and owner.
    let (mut second, same_fingerprint) = test_record(2, "Midnight", "Jane Doe", "acct:mallory");
    second.metadata_ref = "ipfs://xyz999".into();
    let err = store
        .commit_registration(&second, &same_fingerprint)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::FingerprintExists(_))
    ));

    // First registration intact, nothing from the second leaked in.
    assert_eq!(store.work_count().unwrap(), 1);
    assert_eq!(store.next_work_id().unwrap(), WorkId(2));
    assert_eq!(store.get_record(WorkId(1)).unwrap().unwrap(), first);
    assert!(store.get_record(WorkId(2)).unwrap().is_none());
    assert!(store
        .works_by_owner(&AccountId::from("acct:mallory"))
        .unwrap()
        .is_empty());
}

#[test]
fn owner_index_tracks_multiple_works() {
    let dir = TempDir::new().unwrap();
    let store = SledStore::open(dir.path()).unwrap();
    let owner = AccountId::from("acct:jane");

    for (id, title) in [(1, "Midnight"), (2, "Daylight"), (3, "Twilight")] {
        let (record, fingerprint) = test_record(id, title, "Jane Doe", owner.as_str());
        store.commit_registration(&record, &fingerprint).unwrap();
    }

    assert_eq!(
        store.works_by_owner(&owner).unwrap(),
        vec![WorkId(1), WorkId(2), WorkId(3)]
    );
    assert_eq!(store.work_count().unwrap(), 3);
    assert_eq!(store.next_work_id().unwrap(), WorkId(4));
}

#[test]
fn memory_store_rejects_out_of_order_ids() {
    let store = MemoryStore::new();
    let (record, fingerprint) = test_record(3, "Midnight", "Jane Doe", "acct:jane");
    assert!(store.commit_registration(&record, &fingerprint).is_err());
    assert_eq!(store.next_work_id().unwrap(), WorkId::FIRST);
    assert_eq!(store.work_count().unwrap(), 0);
}
