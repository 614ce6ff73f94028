//! JSON shapes served by the HTTP routes and printed by the CLI.

use serde::Serialize;
use stremtmdb_db::models::CacheEntry;

use crate::resolver::{EpisodeOutcome, SeasonOutcome};

/// One Catalog key and the Graph identity it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdMapping {
    pub tmdb: String,
    pub imdb: String,
}

impl From<&CacheEntry> for IdMapping {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            tmdb: entry.key.to_string(),
            imdb: entry.graph_id.to_string(),
        }
    }
}

/// `None` renders as `null` for unresolved episodes.
pub fn episode_mapping(outcome: &EpisodeOutcome) -> Option<IdMapping> {
    match outcome {
        EpisodeOutcome::Stored(entry) => Some(entry.into()),
        EpisodeOutcome::Pending { key, graph_id } => Some(IdMapping {
            tmdb: key.to_string(),
            imdb: graph_id.to_string(),
        }),
        EpisodeOutcome::Unresolved { .. } => None,
    }
}

pub fn season_mappings(outcomes: &[EpisodeOutcome]) -> Vec<Option<IdMapping>> {
    outcomes.iter().map(episode_mapping).collect()
}

pub fn series_mappings(seasons: &[SeasonOutcome]) -> Vec<Vec<Option<IdMapping>>> {
    seasons.iter().map(|s| season_mappings(&s.episodes)).collect()
}

/// Response envelope: exactly one of `response` and `error` is non-null.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub response: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn found(response: T) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    /// Failure for the query addressed by `ids`, e.g. `Query for 1399:1:1 failed`.
    pub fn failed(ids: &[u64]) -> Self {
        let joined = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(":");
        Self {
            response: None,
            error: Some(format!("Query for {joined} failed")),
        }
    }
}
