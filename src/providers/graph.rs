//! Graph provider contract and the records it returns.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ProviderResult;

/// Displayed season text for episodes not yet assigned to a season.
pub const UNKNOWN_SEASON: &str = "unknown";

/// Season and episode exactly as the Graph provider displays them.
///
/// Both are text: the season may be [`UNKNOWN_SEASON`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedPosition {
    pub season: String,
    pub episode: String,
}

impl DisplayedPosition {
    pub fn new(season: impl Into<String>, episode: impl Into<String>) -> Self {
        Self {
            season: season.into(),
            episode: episode.into(),
        }
    }

    pub fn is_unknown_season(&self) -> bool {
        self.season == UNKNOWN_SEASON
    }
}

/// One node of a series' episode list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEpisode {
    pub id: String,
    pub title: Option<String>,
    /// Present only when year, month and day are all known.
    pub release_date: Option<NaiveDate>,
    pub position: Option<DisplayedPosition>,
    pub runtime_seconds: Option<u32>,
}

impl GraphEpisode {
    pub fn is_unplaced(&self) -> bool {
        self.position
            .as_ref()
            .is_some_and(DisplayedPosition::is_unknown_season)
    }
}

/// A series with its complete, episode-then-release ordered episode list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSeries {
    pub id: String,
    pub episodes: Vec<GraphEpisode>,
}

/// Link from an episode title to its series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphParent {
    pub series_id: String,
    pub position: Option<DisplayedPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTitle {
    pub id: String,
    /// `None` for standalone titles such as movies.
    pub parent: Option<GraphParent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub akas: Vec<String>,
    pub runtime_seconds: Option<u32>,
    pub vote_count: u64,
    pub parent: Option<GraphParent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchKind {
    Movie,
    TvEpisode,
}

/// Full-text title search restricted to a single release day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleSearch {
    pub term: String,
    pub release_date: NaiveDate,
    pub kinds: Vec<SearchKind>,
}

impl TitleSearch {
    /// Search for movies and episodes released on `release_date`.
    pub fn new(term: impl Into<String>, release_date: NaiveDate) -> Self {
        Self {
            term: term.into(),
            release_date,
            kinds: vec![SearchKind::Movie, SearchKind::TvEpisode],
        }
    }
}

/// Title-graph metadata source.
#[async_trait]
pub trait GraphProvider: Send + Sync {
    /// Look up one title and, for episodes, its parent series and displayed
    /// numbering.
    async fn title(&self, id: &str) -> ProviderResult<GraphTitle>;

    /// The complete episode list of a series, paginated to exhaustion.
    async fn episodes(&self, series_id: &str) -> ProviderResult<Vec<GraphEpisode>>;

    /// Up to 20 candidates for a title search.
    async fn search(&self, query: &TitleSearch) -> ProviderResult<Vec<SearchCandidate>>;

    /// The episodes of a series whose displayed season is [`UNKNOWN_SEASON`],
    /// in list order. Their positions in this list number them.
    async fn unplaced_episodes(&self, series_id: &str) -> ProviderResult<Vec<GraphEpisode>> {
        let mut episodes = self.episodes(series_id).await?;
        episodes.retain(GraphEpisode::is_unplaced);
        Ok(episodes)
    }

    async fn series(&self, id: &str) -> ProviderResult<GraphSeries> {
        Ok(GraphSeries {
            id: id.to_string(),
            episodes: self.episodes(id).await?,
        })
    }
}
