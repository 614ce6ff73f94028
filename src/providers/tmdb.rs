//! TMDB (The Movie Database) Catalog provider.
//!
//! Implements [`CatalogProvider`] over the TMDB v3 REST API.
//!
//! Features:
//! - Token-bucket rate limiting via [`governor`] (configurable requests / second).
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - 30-second request timeout.
//! - Bearer-token authentication with a v4 read access token.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::catalog::{
    CatalogEpisode, CatalogMovie, CatalogProvider, CatalogSeason, CatalogSeries, SeasonSummary,
};
use super::http::{self, DirectLimiter};
use super::{ProviderError, ProviderResult};
use crate::config::TmdbConfig;

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
    overview: Option<String>,
    imdb_id: Option<String>,
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonSummary {
    season_number: u32,
    #[serde(default)]
    episode_count: u32,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    id: u64,
    name: Option<String>,
    #[serde(default)]
    seasons: Vec<TmdbSeasonSummary>,
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonDetail {
    season_number: u32,
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    season_number: u32,
    episode_number: u32,
    air_date: Option<String>,
    name: Option<String>,
    overview: Option<String>,
    runtime: Option<u32>,
    external_ids: Option<TmdbExternalIds>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// TMDB Catalog client.
///
/// # Examples
///
/// ```no_run
/// use stremtmdb::config::TmdbConfig;
/// use stremtmdb::providers::TmdbClient;
///
/// let config = TmdbConfig {
///     api_token: "your-read-access-token".into(),
///     ..Default::default()
/// };
/// let client = TmdbClient::new(&config).unwrap();
/// ```
pub struct TmdbClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    rate_limiter: DirectLimiter,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(None)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            rate_limiter: http::rate_limiter(config.requests_per_second),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        with_external_ids: bool,
    ) -> ProviderResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "TMDB request");

        let mut request = self.client.get(&url).bearer_auth(&self.api_token);
        if with_external_ids {
            request = request.query(&[("append_to_response", "external_ids")]);
        }

        http::send(&self.rate_limiter, request, "tmdb")
            .await?
            .json()
            .await
            .map_err(|e| {
                ProviderError::unavailable(format!("tmdb: malformed response for {path}: {e}"))
            })
    }
}

/// TMDB sends `""` for unknown dates and ids; both mean absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    let raw = non_empty(value)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(value = %raw, "Ignoring unparseable TMDB date");
            None
        }
    }
}

fn external_graph_id(ids: Option<TmdbExternalIds>) -> Option<String> {
    non_empty(ids.and_then(|ids| ids.imdb_id))
}

impl From<TmdbEpisode> for CatalogEpisode {
    fn from(e: TmdbEpisode) -> Self {
        CatalogEpisode {
            season_number: e.season_number,
            episode_number: e.episode_number,
            air_date: parse_date(e.air_date),
            name: e.name.unwrap_or_default(),
            overview: non_empty(e.overview),
            runtime_minutes: e.runtime,
            graph_id: external_graph_id(e.external_ids),
        }
    }
}

#[async_trait]
impl CatalogProvider for TmdbClient {
    async fn movie(&self, id: u64) -> ProviderResult<CatalogMovie> {
        let detail: TmdbMovieDetail = self.get(&format!("/movie/{id}"), true).await?;

        let graph_id =
            external_graph_id(detail.external_ids).or_else(|| non_empty(detail.imdb_id));

        Ok(CatalogMovie {
            id: detail.id,
            title: detail.title.unwrap_or_default(),
            release_date: parse_date(detail.release_date),
            runtime_minutes: detail.runtime,
            overview: non_empty(detail.overview),
            graph_id,
        })
    }

    async fn series(&self, id: u64) -> ProviderResult<CatalogSeries> {
        let detail: TmdbTvDetail = self.get(&format!("/tv/{id}"), true).await?;

        Ok(CatalogSeries {
            id: detail.id,
            name: detail.name.unwrap_or_default(),
            seasons: detail
                .seasons
                .into_iter()
                .map(|s| SeasonSummary {
                    season_number: s.season_number,
                    episode_count: s.episode_count,
                })
                .collect(),
            graph_id: external_graph_id(detail.external_ids),
        })
    }

    async fn season(&self, series_id: u64, season: u32) -> ProviderResult<CatalogSeason> {
        let detail: TmdbSeasonDetail = self
            .get(&format!("/tv/{series_id}/season/{season}"), false)
            .await?;

        Ok(CatalogSeason {
            season_number: detail.season_number,
            episodes: detail.episodes.into_iter().map(CatalogEpisode::from).collect(),
        })
    }

    async fn episode(
        &self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> ProviderResult<CatalogEpisode> {
        let detail: TmdbEpisode = self
            .get(
                &format!("/tv/{series_id}/season/{season}/episode/{episode}"),
                true,
            )
            .await?;
        Ok(detail.into())
    }
}
