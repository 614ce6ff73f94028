//! Shared test harness for integration tests.
//!
//! Provides in-process fakes for both providers and the identity store, with
//! call counters so tests can assert how much upstream and storage work a
//! resolution did. [`TestHarness`] wires them into a [`Resolver`] and the
//! HTTP router.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use stremtmdb::cache::{IdentityStore, SqliteIdentityStore};
use stremtmdb::providers::{
    CatalogEpisode, CatalogMovie, CatalogProvider, CatalogSeason, CatalogSeries,
    DisplayedPosition, GraphEpisode, GraphParent, GraphProvider, GraphTitle, ProviderError,
    ProviderResult, SearchCandidate, SeasonSummary, TitleSearch,
};
use stremtmdb::resolver::Resolver;
use stremtmdb::server::{create_router, AppContext};
use stremtmdb_common::{CanonicalKey, Error, MediaKind, ResolvedGraphId, Result};
use stremtmdb_db::models::CacheEntry;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

/// Tracks concurrent calls and the highest concurrency observed.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Catalog fake
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCatalog {
    movies: HashMap<u64, CatalogMovie>,
    series: HashMap<u64, CatalogSeries>,
    seasons: HashMap<(u64, u32), CatalogSeason>,
    episode_delay: Option<Duration>,
    unavailable: Vec<&'static str>,
    pub calls: AtomicUsize,
    pub episode_calls: AtomicUsize,
    pub episodes_in_flight: InFlight,
}

impl FakeCatalog {
    pub fn with_movie(mut self, movie: CatalogMovie) -> Self {
        self.movies.insert(movie.id, movie);
        self
    }

    /// Register a series together with its seasons. Season summaries are
    /// derived from the seasons given.
    pub fn with_series(
        mut self,
        id: u64,
        graph_id: Option<&str>,
        seasons: Vec<CatalogSeason>,
    ) -> Self {
        let summaries = seasons
            .iter()
            .map(|s| SeasonSummary {
                season_number: s.season_number,
                episode_count: s.episodes.len() as u32,
            })
            .collect();
        self.series.insert(
            id,
            CatalogSeries {
                id,
                name: format!("Series {id}"),
                seasons: summaries,
                graph_id: graph_id.map(str::to_string),
            },
        );
        for season in seasons {
            self.seasons.insert((id, season.season_number), season);
        }
        self
    }

    pub fn with_episode_delay(mut self, delay: Duration) -> Self {
        self.episode_delay = Some(delay);
        self
    }

    /// Make every call to `operation` (`"movie"`, `"series"`, `"season"` or
    /// `"episode"`) fail with [`ProviderError::Unavailable`].
    pub fn with_unavailable(mut self, operation: &'static str) -> Self {
        self.unavailable.push(operation);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &str) -> ProviderResult<()> {
        if self.unavailable.iter().any(|op| *op == operation) {
            return Err(ProviderError::unavailable(format!("catalog {operation}: 503")));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn movie(&self, id: u64) -> ProviderResult<CatalogMovie> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check("movie")?;
        self.movies
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("movie {id}")))
    }

    async fn series(&self, id: u64) -> ProviderResult<CatalogSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check("series")?;
        self.series
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("series {id}")))
    }

    async fn season(&self, series_id: u64, season: u32) -> ProviderResult<CatalogSeason> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check("season")?;
        self.seasons
            .get(&(series_id, season))
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("season {series_id}/{season}")))
    }

    async fn episode(
        &self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> ProviderResult<CatalogEpisode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.episode_calls.fetch_add(1, Ordering::SeqCst);
        self.episodes_in_flight.enter();
        if let Some(delay) = self.episode_delay {
            tokio::time::sleep(delay).await;
        }
        self.episodes_in_flight.leave();
        self.check("episode")?;

        self.seasons
            .get(&(series_id, season))
            .and_then(|s| s.episodes.iter().find(|e| e.episode_number == episode))
            .cloned()
            .ok_or_else(|| {
                ProviderError::not_found(format!("episode {series_id}/{season}/{episode}"))
            })
    }
}

pub fn catalog_episode(
    season: u32,
    number: u32,
    name: &str,
    air_date: Option<&str>,
    graph_id: Option<&str>,
) -> CatalogEpisode {
    CatalogEpisode {
        season_number: season,
        episode_number: number,
        air_date: air_date.map(date),
        name: name.to_string(),
        overview: None,
        runtime_minutes: None,
        graph_id: graph_id.map(str::to_string),
    }
}

pub fn catalog_season(season_number: u32, episodes: Vec<CatalogEpisode>) -> CatalogSeason {
    CatalogSeason {
        season_number,
        episodes,
    }
}

pub fn catalog_movie(
    id: u64,
    title: &str,
    release_date: Option<&str>,
    graph_id: Option<&str>,
) -> CatalogMovie {
    CatalogMovie {
        id,
        title: title.to_string(),
        release_date: release_date.map(date),
        runtime_minutes: None,
        overview: None,
        graph_id: graph_id.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Graph fake
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeGraph {
    titles: HashMap<String, GraphTitle>,
    episodes: HashMap<String, Vec<GraphEpisode>>,
    search_results: HashMap<String, Vec<SearchCandidate>>,
    unavailable: Vec<&'static str>,
    pub title_calls: AtomicUsize,
    pub episodes_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub searches: Mutex<Vec<TitleSearch>>,
}

impl FakeGraph {
    pub fn with_title(mut self, title: GraphTitle) -> Self {
        self.titles.insert(title.id.clone(), title);
        self
    }

    /// Register a series episode list. Each episode is also registered as a
    /// title whose parent is `series_id`.
    pub fn with_series(mut self, series_id: &str, episodes: Vec<GraphEpisode>) -> Self {
        for episode in &episodes {
            self.titles.insert(
                episode.id.clone(),
                GraphTitle {
                    id: episode.id.clone(),
                    parent: Some(GraphParent {
                        series_id: series_id.to_string(),
                        position: episode.position.clone(),
                    }),
                },
            );
        }
        self.titles.insert(
            series_id.to_string(),
            GraphTitle {
                id: series_id.to_string(),
                parent: None,
            },
        );
        self.episodes.insert(series_id.to_string(), episodes);
        self
    }

    pub fn with_search(mut self, term: &str, candidates: Vec<SearchCandidate>) -> Self {
        self.search_results.insert(term.to_string(), candidates);
        self
    }

    /// Make every call to `operation` (`"title"`, `"episodes"` or
    /// `"search"`) fail with [`ProviderError::Unavailable`].
    pub fn with_unavailable(mut self, operation: &'static str) -> Self {
        self.unavailable.push(operation);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
            + self.episodes_calls.load(Ordering::SeqCst)
            + self.search_calls.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &str) -> ProviderResult<()> {
        if self.unavailable.iter().any(|op| *op == operation) {
            return Err(ProviderError::unavailable(format!("graph {operation}: rate exceeded")));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphProvider for FakeGraph {
    async fn title(&self, id: &str) -> ProviderResult<GraphTitle> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        self.check("title")?;
        self.titles
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("title {id}")))
    }

    async fn episodes(&self, series_id: &str) -> ProviderResult<Vec<GraphEpisode>> {
        self.episodes_calls.fetch_add(1, Ordering::SeqCst);
        self.check("episodes")?;
        self.episodes
            .get(series_id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("series {series_id}")))
    }

    async fn search(&self, query: &TitleSearch) -> ProviderResult<Vec<SearchCandidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(query.clone());
        }
        self.check("search")?;
        Ok(self
            .search_results
            .get(&query.term)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn graph_episode(id: &str, season: &str, number: &str, release: Option<&str>) -> GraphEpisode {
    GraphEpisode {
        id: id.to_string(),
        title: None,
        release_date: release.map(date),
        position: Some(DisplayedPosition::new(season, number)),
        runtime_seconds: None,
    }
}

pub fn candidate(id: &str, title: &str, votes: u64) -> SearchCandidate {
    SearchCandidate {
        id: id.to_string(),
        title: Some(title.to_string()),
        original_title: None,
        akas: Vec::new(),
        runtime_seconds: None,
        vote_count: votes,
        parent: None,
    }
}

// ---------------------------------------------------------------------------
// Identity store fake
// ---------------------------------------------------------------------------

/// HashMap-backed [`IdentityStore`] that records the size of every batch.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<CanonicalKey, CacheEntry>>,
    pub fetch_batches: Mutex<Vec<usize>>,
    pub commit_batches: Mutex<Vec<usize>>,
}

impl MemoryStore {
    pub fn fetch_calls(&self) -> usize {
        self.fetch_batches.lock().unwrap().len()
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_batches.lock().unwrap().len()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Insert a row directly, bypassing the cache layer.
    pub fn seed(&self, key: CanonicalKey, graph_id: ResolvedGraphId, updated_at: DateTime<Utc>) {
        self.rows.lock().unwrap().insert(
            key,
            CacheEntry {
                key,
                graph_id,
                updated_at,
            },
        );
    }

    pub fn get(&self, key: &CanonicalKey) -> Option<CacheEntry> {
        self.rows.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn fetch(&self, keys: &[CanonicalKey]) -> Result<Vec<CacheEntry>> {
        self.fetch_batches.lock().unwrap().push(keys.len());
        let rows = self.rows.lock().unwrap();
        Ok(keys.iter().filter_map(|k| rows.get(k).cloned()).collect())
    }

    async fn commit(
        &self,
        writes: &[(CanonicalKey, ResolvedGraphId)],
        updated_at: DateTime<Utc>,
    ) -> Result<usize> {
        self.commit_batches.lock().unwrap().push(writes.len());
        let mut rows = self.rows.lock().unwrap();
        for (key, graph_id) in writes {
            rows.insert(
                *key,
                CacheEntry {
                    key: *key,
                    graph_id: graph_id.clone(),
                    updated_at,
                },
            );
        }
        Ok(writes.len())
    }

    async fn keys_for_title(&self, kind: MediaKind, title_id: u64) -> Result<Vec<CanonicalKey>> {
        let rows = self.rows.lock().unwrap();
        let mut keys: Vec<CanonicalKey> = rows
            .keys()
            .filter(|k| k.kind == kind && k.title_id == title_id)
            .copied()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn remove(&self, keys: &[CanonicalKey]) -> Result<usize> {
        let mut rows = self.rows.lock().unwrap();
        Ok(keys.iter().filter(|k| rows.remove(k).is_some()).count())
    }
}

/// [`IdentityStore`] whose backend is down: every call fails.
#[derive(Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

impl FailingStore {
    fn fail<T>(&self, operation: &str) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::database(format!("{operation}: database is locked")))
    }
}

#[async_trait]
impl IdentityStore for FailingStore {
    async fn fetch(&self, _keys: &[CanonicalKey]) -> Result<Vec<CacheEntry>> {
        self.fail("fetch")
    }

    async fn commit(
        &self,
        _writes: &[(CanonicalKey, ResolvedGraphId)],
        _updated_at: DateTime<Utc>,
    ) -> Result<usize> {
        self.fail("commit")
    }

    async fn keys_for_title(&self, _kind: MediaKind, _title_id: u64) -> Result<Vec<CanonicalKey>> {
        self.fail("keys_for_title")
    }

    async fn remove(&self, _keys: &[CanonicalKey]) -> Result<usize> {
        self.fail("remove")
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A [`Resolver`] over the given fakes and store.
pub fn resolver_with_store(
    catalog: FakeCatalog,
    graph: FakeGraph,
    store: Arc<dyn IdentityStore>,
) -> Arc<Resolver> {
    Arc::new(Resolver::new(Arc::new(catalog), Arc::new(graph), store, 100))
}

pub fn router_for(resolver: Arc<Resolver>) -> axum::Router {
    create_router(AppContext { resolver })
}

/// A [`Resolver`] over fakes, keeping handles on each for assertions.
pub struct TestHarness {
    pub catalog: Arc<FakeCatalog>,
    pub graph: Arc<FakeGraph>,
    pub store: Arc<MemoryStore>,
    pub resolver: Arc<Resolver>,
}

impl TestHarness {
    pub fn new(catalog: FakeCatalog, graph: FakeGraph) -> Self {
        Self::with_limit(catalog, graph, 100)
    }

    pub fn with_limit(catalog: FakeCatalog, graph: FakeGraph, max_concurrent: usize) -> Self {
        let catalog = Arc::new(catalog);
        let graph = Arc::new(graph);
        let store = Arc::new(MemoryStore::default());
        let resolver = Arc::new(Resolver::new(
            catalog.clone(),
            graph.clone(),
            store.clone(),
            max_concurrent,
        ));
        Self {
            catalog,
            graph,
            store,
            resolver,
        }
    }

    /// Harness over the SQLite store instead of [`MemoryStore`].
    pub fn sqlite(catalog: FakeCatalog, graph: FakeGraph) -> (Arc<Resolver>, SqliteIdentityStore) {
        let store = SqliteIdentityStore::in_memory().expect("failed to create in-memory store");
        let resolver = Arc::new(Resolver::new(
            Arc::new(catalog),
            Arc::new(graph),
            Arc::new(store.clone()),
            100,
        ));
        (resolver, store)
    }

    pub fn upstream_calls(&self) -> usize {
        self.catalog.total_calls() + self.graph.total_calls()
    }

    pub fn router(&self) -> axum::Router {
        router_for(self.resolver.clone())
    }

    /// Start an Axum server on a random port and return its address.
    pub async fn serve(&self) -> SocketAddr {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A two-season series (id 100, Graph `tt100`) whose Graph list mirrors the
/// Catalog numbering, plus one special.
pub fn simple_series() -> (FakeCatalog, FakeGraph) {
    let catalog = FakeCatalog::default().with_series(
        100,
        Some("tt100"),
        vec![
            catalog_season(
                1,
                vec![
                    catalog_episode(1, 1, "Pilot", Some("2020-01-01"), Some("tt101")),
                    catalog_episode(1, 2, "Second", Some("2020-01-08"), None),
                ],
            ),
            catalog_season(
                2,
                vec![catalog_episode(2, 1, "Return", Some("2021-01-01"), None)],
            ),
        ],
    );
    let graph = FakeGraph::default().with_series(
        "tt100",
        vec![
            graph_episode("tt100s", "0", "1", Some("2019-12-01")),
            graph_episode("tt101", "1", "1", Some("2020-01-01")),
            graph_episode("tt102", "1", "2", Some("2020-01-08")),
            graph_episode("tt201", "2", "1", Some("2021-01-01")),
        ],
    );
    (catalog, graph)
}
