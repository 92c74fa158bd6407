//! Non-authoritative projection of a round's eliminations.
//!
//! Only meaningful after the round timer lapsed and before the ledger
//! finalizes the round. The ledger's own finalize step is the source of
//! truth; this shows players what it is expected to do.

use super::gain::compute_live_gain;
use super::ranking::{rank, RankInput, RankedEntry};
use super::snapshots::SnapshotSet;
use crate::domain::{Address, Amount, PlayerRecord, Round};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, warn};

/// Condition that makes a projection untrustworthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProjectionAnomaly {
    /// Ledger reported a cutoff of zero.
    CutoffZero,
    /// Ledger cutoff would let nobody (or everybody) be eliminated.
    CutoffNotBelowAlive { cutoff: u32, alive: u32 },
    /// Ledger alive count disagrees with the alive player records.
    AliveCountMismatch { ledger: u32, scanned: u32 },
    /// A live balance could not be read, so the player's rank is unknown.
    BalanceUnavailable { player: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationProjection {
    pub round: u32,
    /// Cutoff as reported by the ledger.
    pub cutoff_rank: u32,
    /// Cutoff actually applied after clamping.
    pub effective_cutoff: u32,
    pub ranking: Vec<RankedEntry>,
    /// Players expected to be eliminated, in ranking order.
    pub eliminated: Vec<Address>,
    pub full_tie: bool,
    pub anomalies: Vec<ProjectionAnomaly>,
    /// Whether the ledger is expected to end the game after this round,
    /// judged from ledger-reported counts only.
    pub game_ends_after_round: bool,
    /// Gains use raw current balances, so unrelated transfers move them.
    pub approximate: bool,
}

/// Build ranking inputs for alive players from live balances.
///
/// Baseline is the round-start snapshot, falling back to the round-1
/// snapshot. `current` holds None for balances that could not be read.
pub fn live_candidates(
    round: u32,
    alive: &[&PlayerRecord],
    snapshots: &SnapshotSet,
    current: &BTreeMap<Address, Option<Amount>>,
) -> Vec<RankInput> {
    alive
        .iter()
        .map(|record| {
            let snaps = snapshots.player(&record.address);
            let baseline = snaps.and_then(|s| s.start(round).or_else(|| s.game_start()));
            let balance = current.get(&record.address).copied().flatten();
            RankInput {
                player: record.address.clone(),
                gain: compute_live_gain(baseline, balance),
                square_index: record.square_index,
            }
        })
        .collect()
}

/// Project which alive players the ledger will eliminate in `round`.
pub fn project(round: &Round, total_rounds: u32, candidates: Vec<RankInput>) -> EliminationProjection {
    let ranking = rank(candidates);
    let scanned = ranking.len() as u32;
    let mut anomalies = Vec::new();

    let mismatch = round.alive_count_at_start != scanned;
    if mismatch {
        warn!(
            round = round.number,
            ledger = round.alive_count_at_start,
            scanned,
            "Alive count disagrees with player records; withholding projection"
        );
        anomalies.push(ProjectionAnomaly::AliveCountMismatch {
            ledger: round.alive_count_at_start,
            scanned,
        });
    }

    if round.cutoff_rank == 0 {
        error!(round = round.number, "Ledger reported cutoff rank 0");
        anomalies.push(ProjectionAnomaly::CutoffZero);
    } else if round.cutoff_rank >= round.alive_count_at_start {
        error!(
            round = round.number,
            cutoff = round.cutoff_rank,
            alive = round.alive_count_at_start,
            "Ledger cutoff rank not below alive count"
        );
        anomalies.push(ProjectionAnomaly::CutoffNotBelowAlive {
            cutoff: round.cutoff_rank,
            alive: round.alive_count_at_start,
        });
    }

    let unavailable: Vec<&Address> = ranking
        .iter()
        .filter(|e| !e.gain.is_available())
        .map(|e| &e.player)
        .collect();
    for player in &unavailable {
        warn!(round = round.number, player = %player, "Live gain unavailable; withholding projection");
        anomalies.push(ProjectionAnomaly::BalanceUnavailable {
            player: (*player).clone(),
        });
    }
    let incomplete = !unavailable.is_empty();

    // Keep at least one survivor whatever the ledger reported.
    let effective_cutoff = round.cutoff_rank.min(scanned.saturating_sub(1)).max(1);

    let full_tie = scanned > 1
        && ranking
            .windows(2)
            .all(|w| w[0].gain.rank_key() == w[1].gain.rank_key());

    let eliminated = if mismatch || incomplete || full_tie || scanned <= 1 {
        Vec::new()
    } else {
        ranking
            .iter()
            .skip(effective_cutoff as usize)
            .map(|e| e.player.clone())
            .collect()
    };

    let survivors_expected = round.cutoff_rank.min(round.alive_count_at_start);
    let game_ends_after_round = round.number >= total_rounds || survivors_expected <= 1;

    EliminationProjection {
        round: round.number,
        cutoff_rank: round.cutoff_rank,
        effective_cutoff,
        ranking,
        eliminated,
        full_tie,
        anomalies,
        game_ends_after_round,
        approximate: true,
    }
}
