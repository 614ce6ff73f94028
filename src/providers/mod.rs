//! Upstream metadata providers.
//!
//! The Catalog provider (TMDB) answers questions by numeric id; the Graph
//! provider (IMDb) is addressed by opaque string ids and offers full-text
//! search. Both are consumed through traits so the match engine and resolver
//! can be driven by in-memory fakes in tests.

pub mod catalog;
pub mod graph;
mod http;
pub mod imdb;
pub mod tmdb;

pub use catalog::{
    CatalogEpisode, CatalogMovie, CatalogProvider, CatalogSeason, CatalogSeries, SeasonSummary,
};
pub use graph::{
    DisplayedPosition, GraphEpisode, GraphParent, GraphProvider, GraphSeries, GraphTitle,
    SearchCandidate, SearchKind, TitleSearch, UNKNOWN_SEASON,
};
pub use imdb::ImdbClient;
pub use tmdb::TmdbClient;

/// Failure of a single upstream call.
///
/// The match engine treats both variants as "no data"; the distinction only
/// matters for logging.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
