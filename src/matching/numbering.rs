//! Episode numbering arithmetic across the two providers.

use crate::providers::{DisplayedPosition, GraphEpisode, SeasonSummary};

/// Position of an episode counting every episode of earlier seasons.
///
/// Season 0 (specials) never contributes.
pub fn absolute_episode_number(seasons: &[SeasonSummary], season: u32, episode: u32) -> u32 {
    let earlier = seasons
        .iter()
        .filter(|s| s.season_number >= 1 && s.season_number < season)
        .fold(0u32, |acc, s| acc.saturating_add(s.episode_count));
    earlier.saturating_add(episode)
}

/// Graph season and episode numbers for the node `node_id`.
///
/// An unknown season becomes season 0, numbered by the node's one-based
/// position in `episodes`. Returns `None` when the node is not in the list or
/// the displayed numbers are not numeric.
pub fn extract_position(
    node_id: &str,
    position: &DisplayedPosition,
    episodes: &[GraphEpisode],
) -> Option<(u32, u32)> {
    if position.is_unknown_season() {
        let idx = episodes.iter().position(|e| e.id == node_id)?;
        return Some((0, u32::try_from(idx).ok()?.saturating_add(1)));
    }

    let season = position.season.trim().parse().ok()?;
    let episode = position.episode.trim().parse().ok()?;
    Some((season, episode))
}
