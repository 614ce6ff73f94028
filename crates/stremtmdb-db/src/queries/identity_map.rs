//! Identity map queries.
//!
//! Every function here is one backend round-trip. Batch sizing and fan-out are
//! the caller's concern; writes and deletes each run inside one transaction.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use stremtmdb_common::{CanonicalKey, Error, MediaKind, ResolvedGraphId, Result};

use crate::models::CacheEntry;

fn conversion_error(idx: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let kind: MediaKind = row
        .get::<_, String>(0)?
        .parse()
        .map_err(|e| conversion_error(0, e))?;
    let graph_id: ResolvedGraphId = row
        .get::<_, String>(4)?
        .parse()
        .map_err(|e| conversion_error(4, e))?;
    let updated_at = DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
        .map_err(|e| conversion_error(5, Error::invalid_input(e.to_string())))?
        .with_timezone(&Utc);

    Ok(CacheEntry {
        key: CanonicalKey {
            kind,
            title_id: row.get::<_, i64>(1)? as u64,
            season: row.get(2)?,
            episode: row.get(3)?,
        },
        graph_id,
        updated_at,
    })
}

/// Fetch the rows stored for `keys`.
///
/// Missing keys are simply absent from the result; duplicates in `keys` yield
/// the row once per occurrence.
pub fn get_entries(conn: &Connection, keys: &[CanonicalKey]) -> Result<Vec<CacheEntry>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT media_kind, title_id, season, episode, graph_id, updated_at
             FROM identity_map
             WHERE media_kind = ?1 AND title_id = ?2 AND season = ?3 AND episode = ?4",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let result = stmt.query_row(
            params![
                key.kind.storage_code(),
                key.title_id as i64,
                key.season,
                key.episode
            ],
            row_to_entry,
        );

        match result {
            Ok(entry) => entries.push(entry),
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(Error::database(e.to_string())),
        }
    }

    Ok(entries)
}

/// Insert or replace the graph id for each key, stamping `updated_at`.
///
/// Runs as a single transaction: either every row is written or none is.
/// Returns the number of rows written.
pub fn upsert_entries(
    conn: &mut Connection,
    entries: &[(CanonicalKey, ResolvedGraphId)],
    updated_at: DateTime<Utc>,
) -> Result<usize> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    {
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO identity_map (media_kind, title_id, season, episode, graph_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (media_kind, title_id, season, episode)
                 DO UPDATE SET graph_id = excluded.graph_id, updated_at = excluded.updated_at",
            )
            .map_err(|e| Error::database(e.to_string()))?;

        let stamp = updated_at.to_rfc3339();
        for (key, graph_id) in entries {
            stmt.execute(params![
                key.kind.storage_code(),
                key.title_id as i64,
                key.season,
                key.episode,
                graph_id.to_string(),
                stamp,
            ])
            .map_err(|e| Error::database(e.to_string()))?;
        }
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(entries.len())
}

/// List every key stored for one Catalog title, across all seasons and episodes.
pub fn keys_for_title(
    conn: &Connection,
    kind: MediaKind,
    title_id: u64,
) -> Result<Vec<CanonicalKey>> {
    let mut stmt = conn
        .prepare(
            "SELECT season, episode FROM identity_map
             WHERE media_kind = ?1 AND title_id = ?2
             ORDER BY season, episode",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let keys = stmt
        .query_map(params![kind.storage_code(), title_id as i64], |row| {
            Ok(CanonicalKey {
                kind,
                title_id,
                season: row.get(0)?,
                episode: row.get(1)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(keys)
}

/// Delete the rows for `keys` in one transaction. Returns the number removed.
pub fn delete_entries(conn: &mut Connection, keys: &[CanonicalKey]) -> Result<usize> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut removed = 0;
    {
        let mut stmt = tx
            .prepare_cached(
                "DELETE FROM identity_map
                 WHERE media_kind = ?1 AND title_id = ?2 AND season = ?3 AND episode = ?4",
            )
            .map_err(|e| Error::database(e.to_string()))?;

        for key in keys {
            removed += stmt
                .execute(params![
                    key.kind.storage_code(),
                    key.title_id as i64,
                    key.season,
                    key.episode
                ])
                .map_err(|e| Error::database(e.to_string()))?;
        }
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(removed)
}

/// Total number of rows in the identity map.
pub fn count_entries(conn: &Connection) -> Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM identity_map", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
    .map_err(|e| Error::database(e.to_string()))
}
