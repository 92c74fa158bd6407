//! Deterministic ranking of players by gain.
//!
//! Ordering: gain descending, then square index ascending (earlier
//! registration wins ties), then address ascending so the order is total
//! even if the ledger ever reported a duplicate square index.

use super::gain::{compute_gain, Gain};
use super::snapshots::SnapshotSet;
use crate::domain::{Address, PlayerRecord, Round};
use serde::Serialize;
use std::cmp::Ordering;

/// A player to be ranked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankInput {
    pub player: Address,
    pub gain: Gain,
    pub square_index: u32,
}

/// A ranked player. Ranks are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub rank: u32,
    pub player: Address,
    pub gain: Gain,
    pub square_index: u32,
}

/// Ranking comparator shared by live projection and placement fallback.
pub fn compare(a: &RankInput, b: &RankInput) -> Ordering {
    b.gain
        .rank_key()
        .cmp(&a.gain.rank_key())
        .then_with(|| a.square_index.cmp(&b.square_index))
        .then_with(|| a.player.cmp(&b.player))
}

/// Sort and assign ranks. Output order does not depend on input order.
pub fn rank(mut entries: Vec<RankInput>) -> Vec<RankedEntry> {
    entries.sort_by(compare);
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, e)| RankedEntry {
            rank: (idx + 1) as u32,
            player: e.player,
            gain: e.gain,
            square_index: e.square_index,
        })
        .collect()
}

/// Reconstructed outcome of a finalized round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStandings {
    pub round: u32,
    pub cutoff_rank: u32,
    pub alive_count_at_start: u32,
    pub finalized: bool,
    pub ranking: Vec<RankedEntry>,
    /// Players the ledger eliminated in this round, in ranking order.
    pub eliminated: Vec<Address>,
}

/// Rank every player that was alive at the start of `round` by their
/// round-over-round gain. Missing snapshots rank as unavailable rather than
/// dropping the player.
pub fn round_standings(
    round: &Round,
    snapshots: &SnapshotSet,
    records: &[PlayerRecord],
) -> RoundStandings {
    let inputs: Vec<RankInput> = records
        .iter()
        .filter(|r| r.alive_at_start_of(round.number))
        .map(|r| {
            let snaps = snapshots.player(&r.address);
            let gain = match (
                snaps.and_then(|s| s.start(round.number)),
                snaps.and_then(|s| s.end(round.number)),
            ) {
                (Some(start), Some(end)) => compute_gain(start, end),
                _ => Gain::Unavailable,
            };
            RankInput {
                player: r.address.clone(),
                gain,
                square_index: r.square_index,
            }
        })
        .collect();

    let ranking = rank(inputs);
    let eliminated = ranking
        .iter()
        .filter(|entry| {
            records
                .iter()
                .any(|r| r.address == entry.player && r.eliminated_in(round.number))
        })
        .map(|entry| entry.player.clone())
        .collect();

    RoundStandings {
        round: round.number,
        cutoff_rank: round.cutoff_rank,
        alive_count_at_start: round.alive_count_at_start,
        finalized: round.finalized,
        ranking,
        eliminated,
    }
}
