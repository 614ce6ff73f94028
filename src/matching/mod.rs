//! Cross-provider identity matching.
//!
//! [`MatchEngine`] maps one Catalog movie or episode to a [`ResolvedGraphId`],
//! trying in order:
//!
//! 1. the Catalog's cross-reference id, located in the series' Graph episode list;
//! 2. the episode's air date and absolute position in that list;
//! 3. a direct Graph lookup of the cross-reference id;
//! 4. a confidence-scored text search restricted to the release day.
//!
//! Provider failures never escape: each one degrades to the next step, and a
//! movie or episode that no step can place is unresolved (`None`).

pub mod numbering;
pub mod run;
pub mod scoring;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use stremtmdb_common::ResolvedGraphId;
use tracing::{debug, warn};

use crate::providers::{
    CatalogEpisode, CatalogProvider, CatalogSeries, GraphEpisode, GraphParent, GraphProvider,
    GraphSeries, ProviderError, TitleSearch,
};
use numbering::{absolute_episode_number, extract_position};
use scoring::{select_best, CatalogQuery};

pub use run::correct_season_run;

/// Displayed season of specials, excluded from positional matching.
const SPECIALS_SEASON: &str = "0";

/// Facts about one series shared by every episode resolution in a call.
#[derive(Debug, Clone)]
pub struct SeriesContext {
    pub catalog: CatalogSeries,
    /// `None` when the Catalog has no cross-reference or the Graph lookup failed.
    pub graph: Option<GraphSeries>,
}

#[derive(Clone)]
pub struct MatchEngine {
    catalog: Arc<dyn CatalogProvider>,
    graph: Arc<dyn GraphProvider>,
}

fn log_degraded(step: &str, err: &ProviderError) {
    match err {
        ProviderError::NotFound(msg) => debug!(step, %msg, "No upstream data"),
        ProviderError::Unavailable(msg) => warn!(step, %msg, "Upstream unavailable, degrading"),
    }
}

fn is_future(date: NaiveDate) -> bool {
    date > Utc::now().date_naive()
}

impl MatchEngine {
    pub fn new(catalog: Arc<dyn CatalogProvider>, graph: Arc<dyn GraphProvider>) -> Self {
        Self { catalog, graph }
    }

    /// Fetch the Catalog series and, through its cross-reference, the Graph
    /// series with its full episode list.
    ///
    /// `None` only when the Catalog series itself cannot be fetched.
    pub async fn series_context(&self, series_id: u64) -> Option<SeriesContext> {
        let catalog = match self.catalog.series(series_id).await {
            Ok(series) => series,
            Err(e) => {
                log_degraded("catalog series", &e);
                return None;
            }
        };

        let graph = match catalog.graph_id.as_deref() {
            Some(graph_id) => match self.graph.series(graph_id).await {
                Ok(series) => Some(series),
                Err(e) => {
                    log_degraded("graph series", &e);
                    None
                }
            },
            None => None,
        };

        debug!(
            series_id,
            graph_id = ?catalog.graph_id,
            graph_episodes = graph.as_ref().map(|g| g.episodes.len()),
            "Loaded series context"
        );
        Some(SeriesContext { catalog, graph })
    }

    pub async fn resolve_movie(&self, movie_id: u64) -> Option<ResolvedGraphId> {
        let movie = match self.catalog.movie(movie_id).await {
            Ok(movie) => movie,
            Err(e) => {
                log_degraded("catalog movie", &e);
                return None;
            }
        };

        if let Some(graph_id) = movie.graph_id.as_deref() {
            if let Some(resolved) = self.lookup_title(graph_id, None).await {
                debug!(movie_id, graph_id = %resolved, "Resolved movie by cross-reference");
                return Some(resolved);
            }
        }

        let release_date = movie.release_date?;
        let query = CatalogQuery::new(&movie.title, movie.overview.as_deref(), movie.runtime_minutes);
        let resolved = self.search(&movie.title, release_date, &query, None).await;
        if let Some(ref id) = resolved {
            debug!(movie_id, graph_id = %id, "Resolved movie by search");
        }
        resolved
    }

    /// Resolve one episode of `series_id`.
    ///
    /// `context` supplies the series facts for positional matching; without it
    /// only the id lookup and text search steps run.
    pub async fn resolve_episode(
        &self,
        series_id: u64,
        context: Option<&SeriesContext>,
        season: u32,
        episode_number: u32,
    ) -> Option<ResolvedGraphId> {
        let episode = match self
            .catalog
            .episode(series_id, season, episode_number)
            .await
        {
            Ok(episode) => episode,
            Err(e) => {
                log_degraded("catalog episode", &e);
                return None;
            }
        };

        if episode.air_date.is_some_and(is_future) {
            debug!(series_id, season, episode = episode_number, "Episode has not aired");
            return None;
        }

        let graph_series = context.and_then(|c| c.graph.as_ref());

        if season > 0 {
            if let Some(resolved) = graph_series
                .and_then(|series| match_in_list(series, context, &episode))
            {
                debug!(
                    series_id,
                    season,
                    episode = episode_number,
                    graph_id = %resolved,
                    "Resolved episode from series list"
                );
                return Some(resolved);
            }
        }

        if let Some(graph_id) = episode.graph_id.as_deref() {
            if let Some(resolved) = self.lookup_title(graph_id, graph_series).await {
                debug!(
                    series_id,
                    season,
                    episode = episode_number,
                    graph_id = %resolved,
                    "Resolved episode by cross-reference"
                );
                return Some(resolved);
            }
        }

        let air_date = episode.air_date?;
        let query = CatalogQuery::new(
            &episode.name,
            episode.overview.as_deref(),
            episode.runtime_minutes,
        );
        let resolved = self.search(&episode.name, air_date, &query, graph_series).await;
        if let Some(ref id) = resolved {
            debug!(
                series_id,
                season,
                episode = episode_number,
                graph_id = %id,
                "Resolved episode by search"
            );
        }
        resolved
    }

    /// Resolve a known Graph id, numbering it through its parent series.
    async fn lookup_title(
        &self,
        graph_id: &str,
        known_series: Option<&GraphSeries>,
    ) -> Option<ResolvedGraphId> {
        let title = match self.graph.title(graph_id).await {
            Ok(title) => title,
            Err(e) => {
                log_degraded("graph title", &e);
                return None;
            }
        };
        self.number_through_parent(&title.id, title.parent.as_ref(), known_series)
            .await
    }

    async fn search(
        &self,
        term: &str,
        release_date: NaiveDate,
        query: &CatalogQuery,
        known_series: Option<&GraphSeries>,
    ) -> Option<ResolvedGraphId> {
        let candidates = match self.graph.search(&TitleSearch::new(term, release_date)).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log_degraded("graph search", &e);
                return None;
            }
        };

        let best = select_best(query, &candidates)?;
        self.number_through_parent(&best.id, best.parent.as_ref(), known_series)
            .await
    }

    /// Standalone titles resolve to their own id; episodes resolve to their
    /// series plus extracted season and episode numbers. An unknown season is
    /// numbered among the series' other unplaced episodes.
    async fn number_through_parent(
        &self,
        title_id: &str,
        parent: Option<&GraphParent>,
        known_series: Option<&GraphSeries>,
    ) -> Option<ResolvedGraphId> {
        let Some(parent) = parent else {
            return Some(ResolvedGraphId::title(title_id));
        };
        let position = parent.position.as_ref()?;

        let unplaced: Vec<GraphEpisode> = if !position.is_unknown_season() {
            Vec::new()
        } else if let Some(series) = known_series.filter(|s| s.id == parent.series_id) {
            series
                .episodes
                .iter()
                .filter(|e| e.is_unplaced())
                .cloned()
                .collect()
        } else {
            match self.graph.unplaced_episodes(&parent.series_id).await {
                Ok(episodes) => episodes,
                Err(e) => {
                    log_degraded("graph episodes", &e);
                    return None;
                }
            }
        };

        let (season, episode) = extract_position(title_id, position, &unplaced)?;
        Some(ResolvedGraphId::episode(
            parent.series_id.clone(),
            season,
            episode,
        ))
    }
}

/// Locate `episode` in the series' Graph episode list, first by its
/// cross-reference id, then by air date and absolute position together.
///
/// Specials are left out of the search list, but numbering still uses the full
/// list.
fn match_in_list(
    series: &GraphSeries,
    context: Option<&SeriesContext>,
    episode: &CatalogEpisode,
) -> Option<ResolvedGraphId> {
    let candidates: Vec<&GraphEpisode> = series
        .episodes
        .iter()
        .filter(|e| {
            e.position
                .as_ref()
                .map_or(true, |p| p.season != SPECIALS_SEASON)
        })
        .collect();

    let by_id = episode
        .graph_id
        .as_deref()
        .and_then(|id| candidates.iter().find(|e| e.id == id));

    let by_position = || {
        let air_date = episode.air_date?;
        let seasons = context.map(|c| c.catalog.seasons.as_slice()).unwrap_or(&[]);
        let absolute =
            absolute_episode_number(seasons, episode.season_number, episode.episode_number);
        let idx = usize::try_from(absolute.checked_sub(1)?).ok()?;
        candidates
            .get(idx)
            .filter(|e| e.release_date == Some(air_date))
    };

    let node = by_id.or_else(by_position)?;
    let position = node.position.as_ref()?;
    let (season, number) = extract_position(&node.id, position, &series.episodes)?;
    Some(ResolvedGraphId::episode(series.id.clone(), season, number))
}
