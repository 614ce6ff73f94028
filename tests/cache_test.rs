//! Identity cache integration tests.
//!
//! Batch sizing is observed through the instrumented [`MemoryStore`]; row
//! uniqueness is checked against the real SQLite store.

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::MemoryStore;
use stremtmdb::cache::{IdentityCache, SqliteIdentityStore, READ_BATCH_SIZE, WRITE_BATCH_SIZE};
use stremtmdb_common::{CanonicalKey, MediaKind, ResolvedGraphId};
use stremtmdb_db::pool::get_conn;
use stremtmdb_db::queries::identity_map;

fn episode_keys(series: u64, count: u32) -> Vec<CanonicalKey> {
    (1..=count)
        .map(|e| CanonicalKey::episode(series, 1, e))
        .collect()
}

fn instrumented() -> (IdentityCache, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    (IdentityCache::new(store.clone()), store)
}

#[tokio::test]
async fn lookup_of_fifty_keys_uses_three_batches() {
    let (cache, store) = instrumented();

    let found = cache.lookup_many(&episode_keys(1, 50)).await.unwrap();

    assert_eq!(found.len(), 50);
    assert!(found.iter().all(Option::is_none));
    let mut batches = store.fetch_batches.lock().unwrap().clone();
    batches.sort_unstable();
    assert_eq!(batches, vec![2, READ_BATCH_SIZE, READ_BATCH_SIZE]);
}

#[tokio::test]
async fn write_of_twelve_hundred_entries_uses_three_transactions() {
    let (cache, store) = instrumented();
    let entries: Vec<_> = episode_keys(1, 1200)
        .into_iter()
        .map(|k| (k, ResolvedGraphId::episode("tt1", 1, k.episode)))
        .collect();

    let persisted = cache.upsert_many(&entries).await.unwrap();

    assert_eq!(persisted.len(), 1200);
    assert_eq!(persisted[1199].key, CanonicalKey::episode(1, 1, 1200));
    let mut batches = store.commit_batches.lock().unwrap().clone();
    batches.sort_unstable();
    assert_eq!(batches, vec![200, WRITE_BATCH_SIZE, WRITE_BATCH_SIZE]);
    assert_eq!(store.len(), 1200);
}

#[tokio::test]
async fn empty_calls_touch_nothing() {
    let (cache, store) = instrumented();

    assert!(cache.lookup_many(&[]).await.unwrap().is_empty());
    assert!(cache.upsert_many(&[]).await.unwrap().is_empty());

    assert_eq!(store.fetch_calls(), 0);
    assert_eq!(store.commit_calls(), 0);
}

#[tokio::test]
async fn hits_older_than_reference_are_misses() {
    let (cache, store) = instrumented();
    let key = CanonicalKey::episode(5, 2, 3);
    store.seed(
        key,
        ResolvedGraphId::episode("tt5", 2, 3),
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap(),
    );

    let later = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap();
    let found = cache
        .lookup_many_fresh(&[(key, Some(later)), (key, Some(earlier)), (key, None)])
        .await
        .unwrap();

    assert!(found[0].is_none());
    assert!(found[1].is_some());
    assert!(found[2].is_some());
}

#[tokio::test]
async fn duplicate_keys_in_one_write_keep_the_last_value() {
    let (cache, store) = instrumented();
    let key = CanonicalKey::movie(9);

    let persisted = cache
        .upsert_many(&[
            (key, ResolvedGraphId::title("tt_old")),
            (key, ResolvedGraphId::title("tt_new")),
        ])
        .await
        .unwrap();

    assert_eq!(persisted.len(), 2);
    assert!(persisted
        .iter()
        .all(|e| e.graph_id == ResolvedGraphId::title("tt_new")));
    assert_eq!(*store.commit_batches.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn repeated_upserts_leave_one_row() {
    let store = SqliteIdentityStore::in_memory().unwrap();
    let cache = IdentityCache::new(Arc::new(store.clone()));
    let key = CanonicalKey::episode(42, 1, 1);

    for n in 1..=3 {
        cache
            .upsert_one(key, ResolvedGraphId::episode("tt42", 1, n))
            .await
            .unwrap();
    }

    let conn = get_conn(store.pool()).unwrap();
    assert_eq!(identity_map::count_entries(&conn).unwrap(), 1);
    let entry = cache.lookup_one(key).await.unwrap().unwrap();
    assert_eq!(entry.graph_id, ResolvedGraphId::episode("tt42", 1, 3));
}

#[tokio::test]
async fn delete_by_title_spans_write_batches() {
    let (cache, store) = instrumented();
    let entries: Vec<_> = episode_keys(7, 1100)
        .into_iter()
        .map(|k| (k, ResolvedGraphId::episode("tt7", 1, k.episode)))
        .collect();
    cache.upsert_many(&entries).await.unwrap();
    cache
        .upsert_one(CanonicalKey::movie(7), ResolvedGraphId::title("tt_movie"))
        .await
        .unwrap();

    let removed = cache
        .delete_by_catalog_title(MediaKind::Episode, 7)
        .await
        .unwrap();

    assert_eq!(removed, 1100);
    assert_eq!(store.len(), 1);
    assert!(cache
        .lookup_one(CanonicalKey::movie(7))
        .await
        .unwrap()
        .is_some());
}
