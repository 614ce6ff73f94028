//! Season- and series-wide resolution on top of the match engine.
//!
//! The resolver merges identity cache hits with fresh matches, applies run
//! correction per season and writes new identities back in batches. Episode
//! resolutions share one process-wide admission limit.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use stremtmdb_common::{CanonicalKey, MediaKind, ResolvedGraphId, Result};
use stremtmdb_db::models::CacheEntry;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info};

use crate::cache::{start_of_day, IdentityCache, IdentityStore};
use crate::matching::{correct_season_run, MatchEngine, SeriesContext};
use crate::providers::{CatalogProvider, GraphProvider};

/// Result of resolving one Catalog episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// Persisted identity, either a cache hit or a freshly written row.
    Stored(CacheEntry),
    /// Resolved but not yet written (only when persistence was skipped).
    Pending {
        key: CanonicalKey,
        graph_id: ResolvedGraphId,
    },
    Unresolved { key: CanonicalKey },
}

impl EpisodeOutcome {
    pub fn key(&self) -> CanonicalKey {
        match self {
            EpisodeOutcome::Stored(entry) => entry.key,
            EpisodeOutcome::Pending { key, .. } | EpisodeOutcome::Unresolved { key } => *key,
        }
    }

    pub fn graph_id(&self) -> Option<&ResolvedGraphId> {
        match self {
            EpisodeOutcome::Stored(entry) => Some(&entry.graph_id),
            EpisodeOutcome::Pending { graph_id, .. } => Some(graph_id),
            EpisodeOutcome::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.graph_id().is_some()
    }

    fn from_hit(key: CanonicalKey, hit: Option<&CacheEntry>) -> Self {
        match hit {
            Some(entry) => EpisodeOutcome::Stored(entry.clone()),
            None => EpisodeOutcome::Unresolved { key },
        }
    }
}

/// Outcomes for one Catalog season, in Catalog episode order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonOutcome {
    pub season_number: u32,
    pub episodes: Vec<EpisodeOutcome>,
}

type ContextCell = OnceCell<Option<SeriesContext>>;

pub struct Resolver {
    engine: MatchEngine,
    catalog: Arc<dyn CatalogProvider>,
    cache: IdentityCache,
    permits: Arc<Semaphore>,
}

impl Resolver {
    /// `max_concurrent` bounds episode resolutions in flight across every call
    /// made through this resolver.
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        graph: Arc<dyn GraphProvider>,
        store: Arc<dyn IdentityStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            engine: MatchEngine::new(catalog.clone(), graph),
            catalog,
            cache: IdentityCache::new(store),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Resolve a Catalog movie, reading through and writing back the cache.
    pub async fn resolve_movie(&self, movie_id: u64) -> Result<Option<CacheEntry>> {
        let key = CanonicalKey::movie(movie_id);
        if let Some(hit) = self.cache.lookup_one(key).await? {
            debug!(movie_id, graph_id = %hit.graph_id, "Movie cache hit");
            return Ok(Some(hit));
        }

        let resolved = {
            let _permit = self.permits.acquire().await.ok();
            self.engine.resolve_movie(movie_id).await
        };

        match resolved {
            Some(graph_id) => Ok(Some(self.cache.upsert_one(key, graph_id).await?)),
            None => {
                info!(movie_id, "Movie unresolved");
                Ok(None)
            }
        }
    }

    /// Resolve every episode of one Catalog season.
    ///
    /// Returns `None` when the Catalog season cannot be fetched. With
    /// `persist` unset, fresh matches come back as
    /// [`EpisodeOutcome::Pending`] and nothing is written.
    pub async fn resolve_season(
        &self,
        series_id: u64,
        season: u32,
        persist: bool,
    ) -> Result<Option<Vec<EpisodeOutcome>>> {
        let context = ContextCell::new();
        self.resolve_season_with(series_id, season, persist, &context)
            .await
    }

    /// Resolve one episode, resolving and persisting its whole season on a
    /// cache miss. `None` when the season or the episode does not exist.
    pub async fn resolve_episode(
        &self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> Result<Option<EpisodeOutcome>> {
        let key = CanonicalKey::episode(series_id, season, episode);
        if let Some(hit) = self.cache.lookup_one(key).await? {
            return Ok(Some(EpisodeOutcome::Stored(hit)));
        }

        Ok(self
            .resolve_season(series_id, season, true)
            .await?
            .and_then(|outcomes| outcomes.into_iter().find(|o| o.key() == key)))
    }

    /// Resolve every season of a Catalog series.
    ///
    /// Seasons fully covered by the cache are served from it; the others are
    /// resolved with the series facts fetched once for the whole call, and all
    /// new identities are written in one batched pass.
    pub async fn resolve_series(&self, series_id: u64) -> Result<Option<Vec<SeasonOutcome>>> {
        let Some(context) = self.engine.series_context(series_id).await else {
            return Ok(None);
        };
        let seasons = context.catalog.seasons.clone();

        let keys: Vec<CanonicalKey> = seasons
            .iter()
            .flat_map(|s| {
                (1..=s.episode_count)
                    .map(move |e| CanonicalKey::episode(series_id, s.season_number, e))
            })
            .collect();
        let hits = self.cache.lookup_many(&keys).await?;

        let cell = ContextCell::new_with(Some(Some(context)));
        let mut offset = 0;
        let season_calls = seasons.iter().map(|summary| {
            let count = summary.episode_count as usize;
            let season_keys = &keys[offset..offset + count];
            let season_hits = &hits[offset..offset + count];
            offset += count;
            let cell = &cell;

            async move {
                let cached: Vec<EpisodeOutcome> = season_keys
                    .iter()
                    .zip(season_hits)
                    .map(|(key, hit)| EpisodeOutcome::from_hit(*key, hit.as_ref()))
                    .collect();

                if cached.iter().all(EpisodeOutcome::is_resolved) {
                    return Ok(SeasonOutcome {
                        season_number: summary.season_number,
                        episodes: cached,
                    });
                }

                let episodes = self
                    .resolve_season_with(series_id, summary.season_number, false, cell)
                    .await?
                    .unwrap_or(cached);
                Ok::<_, stremtmdb_common::Error>(SeasonOutcome {
                    season_number: summary.season_number,
                    episodes,
                })
            }
        });
        let mut results = try_join_all(season_calls).await?;

        let pending: Vec<(CanonicalKey, ResolvedGraphId)> = results
            .iter()
            .flat_map(|s| s.episodes.iter())
            .filter_map(|o| match o {
                EpisodeOutcome::Pending { key, graph_id } => Some((*key, graph_id.clone())),
                _ => None,
            })
            .collect();

        let persisted = self.cache.upsert_many(&pending).await?;
        let mut persisted = persisted.into_iter();
        for outcome in results.iter_mut().flat_map(|s| s.episodes.iter_mut()) {
            if matches!(outcome, EpisodeOutcome::Pending { .. }) {
                if let Some(entry) = persisted.next() {
                    *outcome = EpisodeOutcome::Stored(entry);
                }
            }
        }

        info!(
            series_id,
            seasons = results.len(),
            written = pending.len(),
            "Resolved series"
        );
        Ok(Some(results))
    }

    /// Remove every cached identity for one Catalog title.
    pub async fn purge(&self, kind: MediaKind, title_id: u64) -> Result<usize> {
        self.cache.delete_by_catalog_title(kind, title_id).await
    }

    async fn resolve_season_with(
        &self,
        series_id: u64,
        season: u32,
        persist: bool,
        context: &ContextCell,
    ) -> Result<Option<Vec<EpisodeOutcome>>> {
        let catalog_season = match self.catalog.season(series_id, season).await {
            Ok(catalog_season) => catalog_season,
            Err(e) => {
                debug!(series_id, season, error = %e, "Catalog season unavailable");
                return Ok(None);
            }
        };

        let requests: Vec<(CanonicalKey, Option<_>)> = catalog_season
            .episodes
            .iter()
            .map(|e| {
                (
                    CanonicalKey::episode(series_id, season, e.episode_number),
                    e.air_date.map(start_of_day),
                )
            })
            .collect();
        let hits = self.cache.lookup_many_fresh(&requests).await?;

        let misses = hits.iter().filter(|h| h.is_none()).count();
        let series_context = if misses > 0 {
            context
                .get_or_init(|| self.engine.series_context(series_id))
                .await
                .as_ref()
        } else {
            None
        };

        let resolutions = requests.iter().zip(&hits).map(|((key, _), hit)| async move {
            if let Some(hit) = hit {
                return Some(hit.graph_id.clone());
            }
            let _permit = self.permits.acquire().await.ok()?;
            self.engine
                .resolve_episode(series_id, series_context, season, key.episode)
                .await
        });
        let mut run: Vec<Option<ResolvedGraphId>> = join_all(resolutions).await;

        if correct_season_run(&mut run) {
            debug!(series_id, season, "Applied season run correction");
        }

        let mut outcomes: Vec<EpisodeOutcome> = requests
            .iter()
            .zip(&hits)
            .zip(run)
            .map(|(((key, _), hit), resolved)| match (resolved, hit) {
                (Some(graph_id), Some(hit)) if hit.graph_id == graph_id => {
                    EpisodeOutcome::Stored(hit.clone())
                }
                (Some(graph_id), _) => EpisodeOutcome::Pending {
                    key: *key,
                    graph_id,
                },
                (None, _) => EpisodeOutcome::Unresolved { key: *key },
            })
            .collect();

        let resolved = outcomes.iter().filter(|o| o.is_resolved()).count();
        info!(
            series_id,
            season,
            episodes = outcomes.len(),
            cache_hits = outcomes.len() - misses,
            resolved,
            "Resolved season"
        );

        if persist {
            let writes: Vec<(CanonicalKey, ResolvedGraphId)> = outcomes
                .iter()
                .filter_map(|o| match o {
                    EpisodeOutcome::Pending { key, graph_id } => Some((*key, graph_id.clone())),
                    _ => None,
                })
                .collect();

            let mut persisted = self.cache.upsert_many(&writes).await?.into_iter();
            for outcome in outcomes.iter_mut() {
                if matches!(outcome, EpisodeOutcome::Pending { .. }) {
                    if let Some(entry) = persisted.next() {
                        *outcome = EpisodeOutcome::Stored(entry);
                    }
                }
            }
        }

        Ok(Some(outcomes))
    }
}
