//! Structured identity values shared across stremtmdb.
//!
//! Keys and resolved ids are always handled in their structured form. The
//! colon-joined strings exist only at the storage and transport boundary, via
//! the `Display`/`FromStr` pair on each type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of Catalog entity a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
}

impl MediaKind {
    /// Short lowercase tag used in key strings (`m` / `e`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "m",
            MediaKind::Episode => "e",
        }
    }

    /// Upper-case code persisted in the identity map.
    pub fn storage_code(&self) -> &'static str {
        match self {
            MediaKind::Movie => "M",
            MediaKind::Episode => "E",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" | "M" | "movie" => Ok(MediaKind::Movie),
            "e" | "E" | "episode" | "series" => Ok(MediaKind::Episode),
            other => Err(Error::invalid_input(format!("unknown media kind: {other}"))),
        }
    }
}

/// Address of one Catalog movie or episode.
///
/// Season and episode are always `0` for movies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalKey {
    pub kind: MediaKind,
    pub title_id: u64,
    pub season: u32,
    pub episode: u32,
}

impl CanonicalKey {
    /// Key for a Catalog movie.
    #[must_use]
    pub fn movie(title_id: u64) -> Self {
        Self {
            kind: MediaKind::Movie,
            title_id,
            season: 0,
            episode: 0,
        }
    }

    /// Key for one episode of a Catalog series.
    #[must_use]
    pub fn episode(series_id: u64, season: u32, episode: u32) -> Self {
        Self {
            kind: MediaKind::Episode,
            title_id: series_id,
            season,
            episode,
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MediaKind::Movie => write!(f, "{}:{}", self.kind, self.title_id),
            MediaKind::Episode => write!(
                f,
                "{}:{}:{}:{}",
                self.kind, self.title_id, self.season, self.episode
            ),
        }
    }
}

/// An identity in the Graph provider's own numbering.
///
/// Movies and other standalone titles carry only `title_id`. Episodes carry the
/// id of their series plus the Graph season and episode number, which may differ
/// from the Catalog's numbering for the same episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResolvedGraphId {
    pub title_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ResolvedGraphId {
    /// A standalone title with no episode numbering.
    pub fn title<S: Into<String>>(title_id: S) -> Self {
        Self {
            title_id: title_id.into(),
            season: None,
            episode: None,
        }
    }

    /// An episode addressed through its series.
    pub fn episode<S: Into<String>>(series_id: S, season: u32, episode: u32) -> Self {
        Self {
            title_id: series_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }
}

impl fmt::Display for ResolvedGraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title_id)?;
        if let Some(season) = self.season {
            write!(f, ":{season}")?;
            if let Some(episode) = self.episode {
                write!(f, ":{episode}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for ResolvedGraphId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split(':');
        let title_id = match segments.next() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(Error::invalid_input(format!("empty graph id: {s:?}"))),
        };

        let mut numbers = Vec::with_capacity(2);
        for segment in segments {
            let n = segment
                .parse::<u32>()
                .map_err(|_| Error::invalid_input(format!("bad graph id segment in {s:?}")))?;
            numbers.push(n);
        }

        match numbers.as_slice() {
            [] => Ok(Self::title(title_id)),
            [season] => Ok(Self {
                title_id,
                season: Some(*season),
                episode: None,
            }),
            [season, episode] => Ok(Self::episode(title_id, *season, *episode)),
            _ => Err(Error::invalid_input(format!("too many graph id segments: {s:?}"))),
        }
    }
}

impl From<ResolvedGraphId> for String {
    fn from(id: ResolvedGraphId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ResolvedGraphId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
