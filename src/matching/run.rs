//! Season run correction.
//!
//! When the first and last resolved entries of a season sit in the same Graph
//! season and their episode-number gap equals their distance in the run, the
//! whole run is rewritten as one contiguous stretch of that Graph season. The
//! rewrite replaces every entry, including interior ones that resolved on
//! their own.

use std::collections::HashMap;

use stremtmdb_common::ResolvedGraphId;

/// Apply run correction in place. Returns whether the run was rewritten.
pub fn correct_season_run(run: &mut [Option<ResolvedGraphId>]) -> bool {
    let (Some(first_idx), Some(last_idx)) = (
        run.iter().position(Option::is_some),
        run.iter().rposition(Option::is_some),
    ) else {
        return false;
    };

    let (Some(first), Some(last)) = (&run[first_idx], &run[last_idx]) else {
        return false;
    };
    let (Some(first_episode), Some(last_episode)) = (first.episode, last.episode) else {
        return false;
    };
    if first.season != last.season {
        return false;
    }
    if (last_idx - first_idx) as i64 != i64::from(last_episode) - i64::from(first_episode) {
        return false;
    }

    let Some(series) = most_common_series(run) else {
        return false;
    };
    let Some(season) = run
        .iter()
        .flatten()
        .find(|id| id.title_id == series)
        .and_then(|id| id.season)
    else {
        return false;
    };

    for (idx, slot) in run.iter_mut().enumerate() {
        let episode = i64::from(first_episode) + idx as i64 - first_idx as i64;
        if let Ok(episode) = u32::try_from(episode) {
            *slot = Some(ResolvedGraphId::episode(series.clone(), season, episode));
        }
    }
    true
}

/// Most frequent series id among resolved entries; ties go to the series that
/// occurs latest in the run.
fn most_common_series(run: &[Option<ResolvedGraphId>]) -> Option<String> {
    let mut tally: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, id) in run.iter().enumerate() {
        if let Some(id) = id {
            let entry = tally.entry(id.title_id.as_str()).or_insert((0, idx));
            entry.0 += 1;
            entry.1 = idx;
        }
    }
    tally
        .into_iter()
        .max_by_key(|(_, (count, last_seen))| (*count, *last_seen))
        .map(|(series, _)| series.to_string())
}
