//! Batched read-through/write-back identity cache.
//!
//! Lookups are split into groups of [`READ_BATCH_SIZE`] keys and writes into
//! transactions of [`WRITE_BATCH_SIZE`] entries; the groups of one call are
//! issued concurrently. A failed batch fails the whole call.

mod store;

pub use store::{IdentityStore, SqliteIdentityStore};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;
use stremtmdb_common::{CanonicalKey, Error, MediaKind, ResolvedGraphId, Result};
use stremtmdb_db::models::CacheEntry;
use tracing::{debug, info};

/// Maximum keys per backend lookup.
pub const READ_BATCH_SIZE: usize = 24;

/// Maximum entries per backend write or delete transaction.
pub const WRITE_BATCH_SIZE: usize = 500;

/// Start of `date` in UTC, used as a staleness reference for air dates.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[derive(Clone)]
pub struct IdentityCache {
    store: Arc<dyn IdentityStore>,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn lookup_one(&self, key: CanonicalKey) -> Result<Option<CacheEntry>> {
        Ok(self.lookup_many(&[key]).await?.pop().flatten())
    }

    /// Look up `keys`, returning one slot per input key in input order.
    ///
    /// Duplicate keys are fetched once and fill every slot they occupy.
    pub async fn lookup_many(&self, keys: &[CanonicalKey]) -> Result<Vec<Option<CacheEntry>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique = Vec::with_capacity(keys.len());
        let mut seen = std::collections::HashSet::with_capacity(keys.len());
        for key in keys {
            if seen.insert(*key) {
                unique.push(*key);
            }
        }

        let batches = unique
            .chunks(READ_BATCH_SIZE)
            .map(|chunk| self.store.fetch(chunk));
        let found: HashMap<CanonicalKey, CacheEntry> = try_join_all(batches)
            .await?
            .into_iter()
            .flatten()
            .map(|entry| (entry.key, entry))
            .collect();

        debug!(
            requested = keys.len(),
            hits = found.len(),
            "Identity cache lookup"
        );

        Ok(keys.iter().map(|key| found.get(key).cloned()).collect())
    }

    /// Like [`lookup_many`](Self::lookup_many), but a hit written before its
    /// reference timestamp is reported as a miss.
    pub async fn lookup_many_fresh(
        &self,
        requests: &[(CanonicalKey, Option<DateTime<Utc>>)],
    ) -> Result<Vec<Option<CacheEntry>>> {
        let keys: Vec<CanonicalKey> = requests.iter().map(|(key, _)| *key).collect();
        let entries = self.lookup_many(&keys).await?;

        Ok(entries
            .into_iter()
            .zip(requests)
            .map(|(entry, (key, reference))| match (entry, reference) {
                (Some(entry), Some(reference)) if entry.is_older_than(*reference) => {
                    debug!(key = %key, updated_at = %entry.updated_at, reference = %reference, "Stale identity cache entry");
                    None
                }
                (entry, _) => entry,
            })
            .collect())
    }

    pub async fn upsert_one(
        &self,
        key: CanonicalKey,
        graph_id: ResolvedGraphId,
    ) -> Result<CacheEntry> {
        self.upsert_many(&[(key, graph_id)])
            .await?
            .pop()
            .ok_or_else(|| Error::database(format!("no entry persisted for {key}")))
    }

    /// Write every pair, then re-read and return the persisted rows in input
    /// order.
    ///
    /// When a key appears more than once the last value wins.
    pub async fn upsert_many(
        &self,
        entries: &[(CanonicalKey, ResolvedGraphId)],
    ) -> Result<Vec<CacheEntry>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_write: HashMap<CanonicalKey, usize> = HashMap::with_capacity(entries.len());
        for (idx, (key, _)) in entries.iter().enumerate() {
            last_write.insert(*key, idx);
        }
        let writes: Vec<(CanonicalKey, ResolvedGraphId)> = entries
            .iter()
            .enumerate()
            .filter(|(idx, (key, _))| last_write.get(key) == Some(idx))
            .map(|(_, pair)| pair.clone())
            .collect();

        let updated_at = Utc::now();
        let batches = writes
            .chunks(WRITE_BATCH_SIZE)
            .map(|chunk| self.store.commit(chunk, updated_at));
        let written: usize = try_join_all(batches).await?.into_iter().sum();

        info!(
            written,
            batches = writes.len().div_ceil(WRITE_BATCH_SIZE),
            "Persisted identity cache entries"
        );

        let keys: Vec<CanonicalKey> = entries.iter().map(|(key, _)| *key).collect();
        self.lookup_many(&keys)
            .await?
            .into_iter()
            .zip(&keys)
            .map(|(entry, key)| {
                entry.ok_or_else(|| Error::database(format!("entry {key} missing after write")))
            })
            .collect()
    }

    /// Remove every entry stored for one Catalog title.
    pub async fn delete_by_catalog_title(&self, kind: MediaKind, title_id: u64) -> Result<usize> {
        let keys = self.store.keys_for_title(kind, title_id).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let batches = keys
            .chunks(WRITE_BATCH_SIZE)
            .map(|chunk| self.store.remove(chunk));
        let removed: usize = try_join_all(batches).await?.into_iter().sum();

        info!(kind = %kind, title_id, removed, "Purged identity cache entries");
        Ok(removed)
    }
}
