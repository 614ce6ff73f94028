//! Backing stores for the identity cache.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stremtmdb_common::{CanonicalKey, Error, MediaKind, ResolvedGraphId, Result};
use stremtmdb_db::models::CacheEntry;
use stremtmdb_db::pool::{self, DbPool};
use stremtmdb_db::queries::identity_map;

/// Keyed storage for reconciled identities.
///
/// Every method is one backend batch. Callers are responsible for keeping
/// batches within the backend's limits.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Point lookups; absent keys are omitted from the result.
    async fn fetch(&self, keys: &[CanonicalKey]) -> Result<Vec<CacheEntry>>;

    /// Idempotent upsert of every pair, stamped with `updated_at`.
    async fn commit(
        &self,
        writes: &[(CanonicalKey, ResolvedGraphId)],
        updated_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Every key stored for one Catalog title.
    async fn keys_for_title(&self, kind: MediaKind, title_id: u64) -> Result<Vec<CanonicalKey>>;

    /// Delete `keys`, returning how many rows existed.
    async fn remove(&self, keys: &[CanonicalKey]) -> Result<usize>;
}

/// [`IdentityStore`] over the SQLite identity map.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    pool: DbPool,
}

impl SqliteIdentityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open (creating and migrating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::invalid_input(format!("non UTF-8 database path: {path:?}")))?;
        Ok(Self::new(pool::init_pool(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(pool::init_memory_pool()?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut pool::PooledConnection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool::get_conn(&pool)?;
            op(&mut conn)
        })
        .await
        .map_err(|e| Error::internal(format!("identity store task failed: {e}")))?
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn fetch(&self, keys: &[CanonicalKey]) -> Result<Vec<CacheEntry>> {
        let keys = keys.to_vec();
        self.run(move |conn| identity_map::get_entries(conn, &keys))
            .await
    }

    async fn commit(
        &self,
        writes: &[(CanonicalKey, ResolvedGraphId)],
        updated_at: DateTime<Utc>,
    ) -> Result<usize> {
        let writes = writes.to_vec();
        self.run(move |conn| identity_map::upsert_entries(conn, &writes, updated_at))
            .await
    }

    async fn keys_for_title(&self, kind: MediaKind, title_id: u64) -> Result<Vec<CanonicalKey>> {
        self.run(move |conn| identity_map::keys_for_title(conn, kind, title_id))
            .await
    }

    async fn remove(&self, keys: &[CanonicalKey]) -> Result<usize> {
        let keys = keys.to_vec();
        self.run(move |conn| identity_map::delete_entries(conn, &keys))
            .await
    }
}
