//! Catalog provider contract and the records it returns.
//!
//! Records are already validated: dates are parsed, empty strings are absent.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ProviderResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMovie {
    pub id: u64,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub runtime_minutes: Option<u32>,
    pub overview: Option<String>,
    /// Cross-reference id for the Graph provider, when the Catalog knows it.
    pub graph_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u32,
    pub episode_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeries {
    pub id: u64,
    pub name: String,
    pub seasons: Vec<SeasonSummary>,
    pub graph_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeason {
    pub season_number: u32,
    pub episodes: Vec<CatalogEpisode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEpisode {
    pub season_number: u32,
    pub episode_number: u32,
    pub air_date: Option<NaiveDate>,
    pub name: String,
    pub overview: Option<String>,
    pub runtime_minutes: Option<u32>,
    /// Only populated by [`CatalogProvider::episode`]; season listings do not
    /// carry external ids.
    pub graph_id: Option<String>,
}

/// Numeric-id movie/TV metadata source.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn movie(&self, id: u64) -> ProviderResult<CatalogMovie>;

    async fn series(&self, id: u64) -> ProviderResult<CatalogSeries>;

    async fn season(&self, series_id: u64, season: u32) -> ProviderResult<CatalogSeason>;

    async fn episode(
        &self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> ProviderResult<CatalogEpisode>;
}
