//! Final placements and prize shares for a finalized game.
//!
//! Payout records emitted by the ledger are ground truth. Only when none can
//! be found are placements computed from alive flags and elimination rounds.

use super::gain::{compute_gain, Gain};
use super::payouts::PayoutLocator;
use super::ranking::{compare, RankInput};
use super::snapshots::SnapshotSet;
use crate::domain::{Address, Amount, Game, GameId, PayoutRecord, PlayerRecord, TxRef};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

/// Prize shares for 1st, 2nd and 3rd in basis points of the pool.
pub const PRIZE_SHARES_BPS: [u128; 3] = [6_000, 3_000, 1_000];

/// Share of collected entry fees used when the ledger reports no pool.
pub const FALLBACK_POOL_BPS: u128 = 7_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub place: u8,
    pub player: Address,
    pub prize_share: Amount,
    pub gain: Gain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loser {
    pub player: Address,
    pub elimination_round: u32,
    pub gain: Gain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementSource {
    /// Read from ledger payout records.
    Payouts,
    /// Derived from alive flags and elimination rounds.
    Computed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub game_id: GameId,
    pub final_round: u32,
    pub prize_pool: Amount,
    pub source: PlacementSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_tx: Option<TxRef>,
    pub placements: Vec<Placement>,
    /// Everyone else, later eliminations first.
    pub losers: Vec<Loser>,
}

/// Ledger pool when positive, otherwise 70% of collected entry fees.
pub fn prize_pool(game: &Game) -> Amount {
    if !game.prize_pool.is_zero() {
        return game.prize_pool;
    }
    game.entry_fee
        .saturating_mul(u128::from(game.player_count))
        .bps_share(FALLBACK_POOL_BPS)
}

/// Fixed share of the pool for a place; zero outside 1..=3.
pub fn prize_share(pool: Amount, place: u8) -> Amount {
    match place {
        1..=3 => pool.bps_share(PRIZE_SHARES_BPS[usize::from(place - 1)]),
        _ => Amount::ZERO,
    }
}

/// Last round the game actually played.
pub fn final_round(game: &Game, records: &[PlayerRecord]) -> u32 {
    let last_elimination = records
        .iter()
        .map(|r| r.elimination_round)
        .max()
        .unwrap_or(0);
    game.current_round
        .min(game.total_rounds)
        .max(last_elimination)
        .max(1)
}

/// Gain from the round-1 start balance to the end of the player's last
/// active round.
pub fn end_to_end_gain(record: &PlayerRecord, snapshots: &SnapshotSet) -> Gain {
    let Some(snaps) = snapshots.player(&record.address) else {
        return Gain::Unavailable;
    };
    let end = if record.elimination_round > 0 {
        snaps.end(record.elimination_round)
    } else {
        snaps.last_end().map(|(_, balance)| balance)
    };
    match (snaps.game_start(), end) {
        (Some(start), Some(end)) => compute_gain(start, end),
        _ => Gain::Unavailable,
    }
}

struct Standing<'a> {
    record: &'a PlayerRecord,
    gain: Gain,
}

impl Standing<'_> {
    fn rank_input(&self) -> RankInput {
        RankInput {
            player: self.record.address.clone(),
            gain: self.gain,
            square_index: self.record.square_index,
        }
    }

    /// Alive players sort above any elimination round.
    fn survival_key(&self) -> u32 {
        if self.record.alive {
            u32::MAX
        } else {
            self.record.elimination_round
        }
    }
}

fn standing_order(a: &Standing<'_>, b: &Standing<'_>) -> Ordering {
    b.survival_key()
        .cmp(&a.survival_key())
        .then_with(|| compare(&a.rank_input(), &b.rank_input()))
}

fn standings<'a>(records: &'a [PlayerRecord], snapshots: &SnapshotSet) -> Vec<Standing<'a>> {
    let mut standings: Vec<Standing<'a>> = records
        .iter()
        .map(|record| Standing {
            record,
            gain: end_to_end_gain(record, snapshots),
        })
        .collect();
    standings.sort_by(standing_order);
    standings
}

fn losers_excluding(standings: &[Standing<'_>], placed: &BTreeSet<&Address>) -> Vec<Loser> {
    standings
        .iter()
        .filter(|s| !placed.contains(&s.record.address))
        .map(|s| Loser {
            player: s.record.address.clone(),
            elimination_round: s.record.elimination_round,
            gain: s.gain,
        })
        .collect()
}

/// Placements taken verbatim from ledger payout records.
pub fn resolve_from_payouts(
    game: &Game,
    records: &[PlayerRecord],
    snapshots: &SnapshotSet,
    payouts: &[PayoutRecord],
) -> GameResult {
    let standings = standings(records, snapshots);

    let mut seen_places = BTreeSet::new();
    let mut placements = Vec::new();
    for payout in payouts {
        if !(1..=3).contains(&payout.place) {
            warn!(game=%game.id, place = payout.place, "Ignoring payout for unknown place");
            continue;
        }
        if !seen_places.insert(payout.place) {
            warn!(game=%game.id, place = payout.place, "Duplicate payout record for place");
            continue;
        }
        let gain = standings
            .iter()
            .find(|s| s.record.address == payout.winner)
            .map(|s| s.gain)
            .unwrap_or(Gain::Unavailable);
        placements.push(Placement {
            place: payout.place,
            player: payout.winner.clone(),
            prize_share: payout.amount,
            gain,
        });
    }
    placements.sort_by_key(|p| p.place);
    if placements.is_empty() {
        error!(
            game=%game.id,
            records = payouts.len(),
            "Payout records found but none name a prize place"
        );
    }

    let placed: BTreeSet<&Address> = placements.iter().map(|p| &p.player).collect();
    let losers = losers_excluding(&standings, &placed);

    GameResult {
        game_id: game.id,
        final_round: final_round(game, records),
        prize_pool: prize_pool(game),
        source: PlacementSource::Payouts,
        payout_tx: payouts.first().map(|p| p.tx_ref.clone()),
        placements,
        losers,
    }
}

/// Placements computed from alive flags and elimination rounds.
///
/// 1st is the top alive player, 2nd the best player eliminated in the final
/// round, 3rd the best eliminated the round before. Unoccupied places stay
/// empty and their share is not redistributed.
pub fn resolve_computed(
    game: &Game,
    records: &[PlayerRecord],
    snapshots: &SnapshotSet,
) -> GameResult {
    let standings = standings(records, snapshots);
    let final_round = final_round(game, records);
    let pool = prize_pool(game);

    let alive_count = standings.iter().filter(|s| s.record.alive).count();
    if alive_count != 1 {
        warn!(game=%game.id, alive_count, "Finalized game does not have exactly one survivor");
    }

    // Standings are already in tie-break order, so the first match wins.
    let first = standings.iter().find(|s| s.record.alive);
    let second = standings
        .iter()
        .find(|s| !s.record.alive && s.record.eliminated_in(final_round));
    let third = standings
        .iter()
        .find(|s| !s.record.alive && s.record.eliminated_in(final_round.saturating_sub(1)));

    let placements: Vec<Placement> = [(1u8, first), (2, second), (3, third)]
        .into_iter()
        .filter_map(|(place, standing)| {
            standing.map(|s| Placement {
                place,
                player: s.record.address.clone(),
                prize_share: prize_share(pool, place),
                gain: s.gain,
            })
        })
        .collect();

    let placed: BTreeSet<&Address> = placements.iter().map(|p| &p.player).collect();
    let losers = losers_excluding(&standings, &placed);

    GameResult {
        game_id: game.id,
        final_round,
        prize_pool: pool,
        source: PlacementSource::Computed,
        payout_tx: None,
        placements,
        losers,
    }
}

/// Resolves placements, preferring ledger payout records.
#[derive(Debug, Clone)]
pub struct PlacementResolver {
    locator: PayoutLocator,
}

impl PlacementResolver {
    pub fn new(locator: PayoutLocator) -> Self {
        Self { locator }
    }

    pub async fn resolve(
        &self,
        game: &Game,
        records: &[PlayerRecord],
        snapshots: &SnapshotSet,
    ) -> GameResult {
        let payouts = self.locator.locate(game.id).await;
        if payouts.is_empty() {
            info!(game=%game.id, "No payout records found; computing placements");
            resolve_computed(game, records, snapshots)
        } else {
            info!(game=%game.id, records = payouts.len(), "Resolved placements from payout records");
            resolve_from_payouts(game, records, snapshots, &payouts)
        }
    }
}
