//! Internal Rust models matching the database schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stremtmdb_common::{CanonicalKey, ResolvedGraphId};

/// One reconciled identity, as persisted in the `identity_map` table.
///
/// There is at most one row per [`CanonicalKey`]; later writes replace the
/// graph id and refresh `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CanonicalKey,
    pub graph_id: ResolvedGraphId,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether this entry was written before `reference`.
    ///
    /// Used to bypass rows written before a Catalog air date was corrected.
    pub fn is_older_than(&self, reference: DateTime<Utc>) -> bool {
        self.updated_at < reference
    }
}
