//! IMDb Graph provider.
//!
//! Implements [`GraphProvider`] over the IMDb GraphQL API. Requests share the
//! TMDB client's discipline (rate limit, 429 retry, timeout); episode lists are
//! paginated sequentially by `endCursor` until `hasNextPage` is false.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::graph::{
    DisplayedPosition, GraphEpisode, GraphParent, GraphProvider, GraphTitle, SearchCandidate,
    TitleSearch, UNKNOWN_SEASON,
};
use super::http::{self, DirectLimiter};
use super::{ProviderError, ProviderResult};
use crate::config::ImdbConfig;

const SEARCH_RESULTS: u32 = 20;
const MAX_AKAS: u32 = 100;

const EPISODES_QUERY: &str = r#"
query SeriesEpisodes($id: ID!, $first: Int!, $after: ID, $filter: EpisodesFilter) {
  title(id: $id) {
    id
    episodes {
      episodes(
        filter: $filter
        sort: { by: EPISODE_THEN_RELEASE, order: ASC }
        first: $first
        after: $after
      ) {
        edges {
          node {
            id
            titleText { text }
            releaseDate { year month day }
            runtime { seconds }
            series {
              displayableEpisodeNumber {
                displayableSeason { text }
                episodeNumber { text }
              }
            }
          }
        }
        pageInfo { endCursor hasNextPage }
      }
    }
  }
}
"#;

const TITLE_QUERY: &str = r#"
query Title($id: ID!) {
  title(id: $id) {
    id
    series {
      series { id }
      displayableEpisodeNumber {
        displayableSeason { text }
        episodeNumber { text }
      }
    }
  }
}
"#;

const SEARCH_QUERY: &str = r#"
query TitleSearch($search: MainSearchOptions!, $first: Int!, $akas: Int!) {
  mainSearch(first: $first, options: $search) {
    edges {
      node {
        entity {
          __typename
          ... on Title {
            id
            titleText { text }
            originalTitleText { text }
            akas(first: $akas) { edges { node { text } } }
            runtime { seconds }
            ratingsSummary { voteCount }
            series {
              series { id }
              displayableEpisodeNumber {
                displayableSeason { text }
                episodeNumber { text }
              }
            }
          }
        }
      }
    }
  }
}
"#;

// ---------------------------------------------------------------------------
// GraphQL response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Text {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayableEpisodeNumber {
    displayable_season: Option<Text>,
    episode_number: Option<Text>,
}

impl DisplayableEpisodeNumber {
    fn into_position(self) -> Option<DisplayedPosition> {
        let season = self.displayable_season?.text?;
        let episode = self.episode_number?.text?;
        Some(DisplayedPosition::new(season, episode))
    }
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesLink {
    series: Option<IdNode>,
    displayable_episode_number: Option<DisplayableEpisodeNumber>,
}

impl SeriesLink {
    fn position(self) -> Option<DisplayedPosition> {
        self.displayable_episode_number
            .and_then(DisplayableEpisodeNumber::into_position)
    }

    fn into_parent(self) -> Option<GraphParent> {
        let series_id = self.series.as_ref()?.id.clone();
        Some(GraphParent {
            series_id,
            position: self.position(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawReleaseDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl RawReleaseDate {
    fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day?)
    }
}

#[derive(Debug, Deserialize)]
struct Runtime {
    seconds: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Option<Edge<T>>>,
    page_info: Option<PageInfo>,
}

impl<T> Connection<T> {
    fn into_nodes(self) -> impl Iterator<Item = T> {
        self.edges.into_iter().flatten().filter_map(|e| e.node)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeNode {
    id: String,
    title_text: Option<Text>,
    release_date: Option<RawReleaseDate>,
    runtime: Option<Runtime>,
    series: Option<SeriesLink>,
}

impl From<EpisodeNode> for GraphEpisode {
    fn from(node: EpisodeNode) -> Self {
        GraphEpisode {
            id: node.id,
            title: node.title_text.and_then(|t| t.text),
            release_date: node.release_date.as_ref().and_then(RawReleaseDate::to_date),
            position: node.series.and_then(SeriesLink::position),
            runtime_seconds: node.runtime.and_then(|r| r.seconds),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EpisodesHolder {
    episodes: Option<Connection<EpisodeNode>>,
}

#[derive(Debug, Deserialize)]
struct EpisodesTitle {
    episodes: Option<EpisodesHolder>,
}

#[derive(Debug, Deserialize)]
struct EpisodesData {
    title: Option<EpisodesTitle>,
}

#[derive(Debug, Deserialize)]
struct TitleNode {
    id: String,
    series: Option<SeriesLink>,
}

#[derive(Debug, Deserialize)]
struct TitleData {
    title: Option<TitleNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingsSummary {
    vote_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntity {
    #[serde(rename = "__typename")]
    typename: Option<String>,
    id: Option<String>,
    title_text: Option<Text>,
    original_title_text: Option<Text>,
    akas: Option<Connection<Text>>,
    runtime: Option<Runtime>,
    ratings_summary: Option<RatingsSummary>,
    series: Option<SeriesLink>,
}

impl SearchEntity {
    fn into_candidate(self) -> Option<SearchCandidate> {
        if self.typename.as_deref().is_some_and(|t| t != "Title") {
            return None;
        }
        Some(SearchCandidate {
            id: self.id?,
            title: self.title_text.and_then(|t| t.text),
            original_title: self.original_title_text.and_then(|t| t.text),
            akas: self
                .akas
                .map(|c| c.into_nodes().filter_map(|t| t.text).collect())
                .unwrap_or_default(),
            runtime_seconds: self.runtime.and_then(|r| r.seconds),
            vote_count: self
                .ratings_summary
                .and_then(|r| r.vote_count)
                .unwrap_or(0),
            parent: self.series.and_then(SeriesLink::into_parent),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchNode {
    entity: Option<SearchEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    main_search: Option<Connection<SearchNode>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// IMDb GraphQL client.
pub struct ImdbClient {
    client: reqwest::Client,
    endpoint: String,
    page_size: u32,
    rate_limiter: DirectLimiter,
}

impl ImdbClient {
    pub fn new(config: &ImdbConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(Some(&config.user_agent))?,
            endpoint: config.endpoint.clone(),
            page_size: config.page_size,
            rate_limiter: http::rate_limiter(config.requests_per_second),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> ProviderResult<T> {
        debug!(operation, %variables, "IMDb request");

        let body = json!({
            "operationName": operation,
            "query": query,
            "variables": variables,
        });
        let request = self.client.post(&self.endpoint).json(&body);

        let parsed: GraphQlResponse<T> = http::send(&self.rate_limiter, request, "imdb")
            .await?
            .json()
            .await
            .map_err(|e| {
                ProviderError::unavailable(format!("imdb: malformed {operation} response: {e}"))
            })?;

        let messages = parsed
            .errors
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");

        match parsed.data {
            Some(data) => {
                if !messages.is_empty() {
                    warn!(operation, errors = %messages, "IMDb returned partial data");
                }
                Ok(data)
            }
            None => Err(ProviderError::unavailable(format!(
                "imdb: {operation} returned no data: {messages}"
            ))),
        }
    }

    /// Page through a series' episode list to exhaustion. `filter` is an
    /// `EpisodesFilter`, or null for every episode.
    async fn episode_list(
        &self,
        series_id: &str,
        filter: Value,
    ) -> ProviderResult<Vec<GraphEpisode>> {
        let mut episodes = Vec::new();
        let mut after: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let data: EpisodesData = self
                .query(
                    "SeriesEpisodes",
                    EPISODES_QUERY,
                    json!({
                        "id": series_id,
                        "first": self.page_size,
                        "after": after,
                        "filter": filter,
                    }),
                )
                .await?;
            pages += 1;

            let title = data
                .title
                .ok_or_else(|| ProviderError::not_found(format!("imdb series {series_id}")))?;
            let Some(connection) = title.episodes.and_then(|e| e.episodes) else {
                break;
            };

            let next = connection
                .page_info
                .as_ref()
                .filter(|p| p.has_next_page)
                .and_then(|p| p.end_cursor.clone());
            episodes.extend(connection.into_nodes().map(GraphEpisode::from));

            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        debug!(series_id, pages, episodes = episodes.len(), "Fetched IMDb episode list");
        Ok(episodes)
    }
}

#[async_trait]
impl GraphProvider for ImdbClient {
    async fn title(&self, id: &str) -> ProviderResult<GraphTitle> {
        let data: TitleData = self.query("Title", TITLE_QUERY, json!({ "id": id })).await?;
        let title = data
            .title
            .ok_or_else(|| ProviderError::not_found(format!("imdb title {id}")))?;

        Ok(GraphTitle {
            id: title.id,
            parent: title.series.and_then(SeriesLink::into_parent),
        })
    }

    async fn episodes(&self, series_id: &str) -> ProviderResult<Vec<GraphEpisode>> {
        self.episode_list(series_id, Value::Null).await
    }

    async fn unplaced_episodes(&self, series_id: &str) -> ProviderResult<Vec<GraphEpisode>> {
        self.episode_list(series_id, json!({ "includeSeasons": [UNKNOWN_SEASON] }))
            .await
    }

    async fn search(&self, query: &TitleSearch) -> ProviderResult<Vec<SearchCandidate>> {
        let day = query.release_date.format("%Y-%m-%d").to_string();
        let variables = json!({
            "search": {
                "type": ["TITLE"],
                "searchTerm": query.term,
                "titleSearchOptions": {
                    "type": query.kinds,
                    "releaseDateRange": { "start": day, "end": day },
                },
            },
            "first": SEARCH_RESULTS,
            "akas": MAX_AKAS,
        });

        let data: SearchData = self.query("TitleSearch", SEARCH_QUERY, variables).await?;

        Ok(data
            .main_search
            .map(|c| {
                c.into_nodes()
                    .filter_map(|n| n.entity)
                    .filter_map(SearchEntity::into_candidate)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_date_requires_all_parts() {
        let full = RawReleaseDate {
            year: Some(2011),
            month: Some(4),
            day: Some(17),
        };
        assert_eq!(full.to_date(), NaiveDate::from_ymd_opt(2011, 4, 17));

        let partial = RawReleaseDate {
            year: Some(2011),
            month: None,
            day: Some(17),
        };
        assert_eq!(partial.to_date(), None);
    }

    #[test]
    fn episode_node_conversion() {
        let node: EpisodeNode = serde_json::from_value(json!({
            "id": "tt1480055",
            "titleText": { "text": "Winter Is Coming" },
            "releaseDate": { "year": 2011, "month": 4, "day": 17 },
            "runtime": { "seconds": 3720 },
            "series": {
                "displayableEpisodeNumber": {
                    "displayableSeason": { "text": "1" },
                    "episodeNumber": { "text": "1" }
                }
            }
        }))
        .unwrap();

        let episode = GraphEpisode::from(node);
        assert_eq!(episode.title.as_deref(), Some("Winter Is Coming"));
        assert_eq!(episode.runtime_seconds, Some(3720));
        assert_eq!(episode.position, Some(DisplayedPosition::new("1", "1")));
    }

    #[test]
    fn non_title_search_entities_are_dropped() {
        let entity: SearchEntity = serde_json::from_value(json!({
            "__typename": "Name",
        }))
        .unwrap();
        assert!(entity.into_candidate().is_none());
    }
}
