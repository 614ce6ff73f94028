//! Confidence scoring of Graph search candidates against a Catalog title.
//!
//! Title and runtime signals are additive:
//!
//! | signal                                   | points |
//! |------------------------------------------|--------|
//! | a normalized candidate title equals ours | 10     |
//! | else one contains the other              | 5      |
//! | runtime differs by < 2 minutes           | 10     |
//! | else runtime differs by < 5 minutes      | 5      |
//!
//! A candidate scoring 0 is never selected.

use std::sync::LazyLock;

use regex::Regex;

use crate::providers::SearchCandidate;

pub const EXACT_TITLE_POINTS: u32 = 10;
pub const PARTIAL_TITLE_POINTS: u32 = 5;
pub const CLOSE_RUNTIME_POINTS: u32 = 10;
pub const NEAR_RUNTIME_POINTS: u32 = 5;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}0-9]").expect("valid character class"));

static PART_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" \((\d)\)$").expect("valid suffix pattern"));

/// Overview marker for crossover episodes, whose `(N)` suffix is not a part number.
const CROSSOVER_MARKER: &str = "The crossover";

/// Lower-case `title` and strip everything but letters and ASCII digits.
pub fn normalize(title: &str) -> String {
    NON_ALPHANUMERIC.replace_all(title, "").to_lowercase()
}

/// The Catalog side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Normalized title, with `" (N)"` rewritten to `", Part N"`.
    pub title_key: String,
    pub runtime_minutes: Option<u32>,
}

impl CatalogQuery {
    pub fn new(title: &str, overview: Option<&str>, runtime_minutes: Option<u32>) -> Self {
        let replacement = if overview.is_some_and(|o| o.contains(CROSSOVER_MARKER)) {
            ""
        } else {
            ", Part $1"
        };

        Self {
            title_key: normalize(&PART_SUFFIX.replace(title, replacement)),
            runtime_minutes,
        }
    }
}

/// Every normalized, non-empty title a candidate is known by.
///
/// For episodes the Graph provider has not placed in a season, the part of the
/// primary title after the first `": "` is included too, since such entries are
/// often prefixed with the series name.
pub fn candidate_titles(candidate: &SearchCandidate) -> Vec<String> {
    let Some(primary) = candidate.title.as_deref() else {
        return Vec::new();
    };

    let mut raw: Vec<&str> = vec![primary];
    raw.extend(candidate.original_title.as_deref());
    raw.extend(candidate.akas.iter().map(String::as_str));

    let unplaced = candidate
        .parent
        .as_ref()
        .and_then(|p| p.position.as_ref())
        .is_some_and(|p| p.is_unknown_season());
    if unplaced {
        if let Some((_, suffix)) = primary.split_once(": ") {
            raw.push(suffix);
        }
    }

    let mut titles: Vec<String> = Vec::with_capacity(raw.len());
    for title in raw {
        let normalized = normalize(title);
        if !normalized.is_empty() && !titles.contains(&normalized) {
            titles.push(normalized);
        }
    }
    titles
}

fn title_points(query: &CatalogQuery, titles: &[String]) -> u32 {
    if query.title_key.is_empty() {
        return 0;
    }
    if titles.iter().any(|t| *t == query.title_key) {
        EXACT_TITLE_POINTS
    } else if titles
        .iter()
        .any(|t| t.contains(&query.title_key) || query.title_key.contains(t.as_str()))
    {
        PARTIAL_TITLE_POINTS
    } else {
        0
    }
}

/// An unknown runtime on either side scores nothing, rather than counting
/// as zero minutes.
fn runtime_points(catalog_minutes: Option<u32>, graph_seconds: Option<u32>) -> u32 {
    let (Some(minutes), Some(seconds)) = (catalog_minutes, graph_seconds) else {
        return 0;
    };
    let graph_minutes = seconds.saturating_add(30) / 60;
    match minutes.abs_diff(graph_minutes) {
        0..=1 => CLOSE_RUNTIME_POINTS,
        2..=4 => NEAR_RUNTIME_POINTS,
        _ => 0,
    }
}

/// Confidence that `candidate` is the Catalog item described by `query`.
pub fn score(query: &CatalogQuery, candidate: &SearchCandidate) -> u32 {
    let titles = candidate_titles(candidate);
    if titles.is_empty() {
        return 0;
    }
    title_points(query, &titles) + runtime_points(query.runtime_minutes, candidate.runtime_seconds)
}

/// Highest-scoring candidate, ties broken by vote count then provider order.
pub fn select_best<'a>(
    query: &CatalogQuery,
    candidates: &'a [SearchCandidate],
) -> Option<&'a SearchCandidate> {
    let mut best: Option<(u32, u64, &SearchCandidate)> = None;
    for candidate in candidates {
        let points = score(query, candidate);
        if points == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_points, best_votes, _)) => {
                points > best_points || (points == best_points && candidate.vote_count > best_votes)
            }
        };
        if better {
            best = Some((points, candidate.vote_count, candidate));
        }
    }
    best.map(|(_, _, candidate)| candidate)
}
