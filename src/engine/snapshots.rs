//! Collection of per-round start/end balance snapshots.
//!
//! Reads are issued concurrently and merged by the caller's task only, so
//! each (player, round, kind) cell has exactly one writer.

use crate::domain::{Address, Amount, GameId, Round};
use crate::ledger::Ledger;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// Snapshots recorded for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshots {
    /// Round -> balance at round start. Always a contiguous prefix from 1.
    pub starts: BTreeMap<u32, Amount>,
    /// Round -> balance at round end.
    pub ends: BTreeMap<u32, Amount>,
}

impl PlayerSnapshots {
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty() && self.ends.is_empty()
    }

    pub fn start(&self, round: u32) -> Option<Amount> {
        self.starts.get(&round).copied()
    }

    pub fn end(&self, round: u32) -> Option<Amount> {
        self.ends.get(&round).copied()
    }

    /// Round-1 start balance.
    pub fn game_start(&self) -> Option<Amount> {
        self.start(1)
    }

    /// Latest recorded round end.
    pub fn last_end(&self) -> Option<(u32, Amount)> {
        self.ends.iter().next_back().map(|(r, b)| (*r, *b))
    }
}

/// Everything collected for one game in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSet {
    pub max_round: u32,
    /// Round metadata that could be read.
    pub rounds: BTreeMap<u32, Round>,
    pub finalized_rounds: BTreeSet<u32>,
    /// Players with at least one start or end entry.
    pub players: BTreeMap<Address, PlayerSnapshots>,
}

impl SnapshotSet {
    pub fn player(&self, player: &Address) -> Option<&PlayerSnapshots> {
        self.players.get(player)
    }

    pub fn round(&self, number: u32) -> Option<&Round> {
        self.rounds.get(&number)
    }
}

/// Gathers start/end balance snapshots for every player of a game.
#[derive(Debug, Clone)]
pub struct SnapshotCollector {
    ledger: Arc<dyn Ledger>,
}

impl SnapshotCollector {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Collect snapshots for rounds `1..=max_round`.
    ///
    /// Individual read failures are logged and treated as absent data.
    pub async fn collect(
        &self,
        game_id: GameId,
        max_round: u32,
        players: &[Address],
    ) -> SnapshotSet {
        let rounds = self.collect_rounds(game_id, max_round).await;
        let finalized_rounds: BTreeSet<u32> = rounds
            .values()
            .filter(|r| r.finalized)
            .map(|r| r.number)
            .collect();

        let (ends, starts) = futures::join!(
            self.read_end_balances(game_id, max_round, players),
            self.scan_start_balances(game_id, max_round, players),
        );

        let mut result: BTreeMap<Address, PlayerSnapshots> = BTreeMap::new();

        for (player, round, balance) in ends {
            let Some(balance) = balance else { continue };
            // A zero before finalization is indistinguishable from "not written yet".
            if !balance.is_zero() || finalized_rounds.contains(&round) {
                result.entry(player).or_default().ends.insert(round, balance);
            }
        }

        for (player, player_starts) in starts {
            if !player_starts.is_empty() {
                result.entry(player).or_default().starts = player_starts;
            }
        }

        result.retain(|_, snaps| !snaps.is_empty());

        SnapshotSet {
            max_round,
            rounds,
            finalized_rounds,
            players: result,
        }
    }

    async fn collect_rounds(&self, game_id: GameId, max_round: u32) -> BTreeMap<u32, Round> {
        let reads = (1..=max_round).map(|round| {
            let ledger = self.ledger.clone();
            async move { (round, ledger.get_round(game_id, round).await) }
        });

        let mut rounds = BTreeMap::new();
        for (round, result) in join_all(reads).await {
            match result {
                Ok(meta) => {
                    rounds.insert(round, meta);
                }
                Err(e) => warn!(game=%game_id, round, error=%e, "Round metadata unavailable"),
            }
        }
        rounds
    }

    async fn read_end_balances(
        &self,
        game_id: GameId,
        max_round: u32,
        players: &[Address],
    ) -> Vec<(Address, u32, Option<Amount>)> {
        let reads = players.iter().flat_map(|player| {
            (1..=max_round).map(move |round| {
                let ledger = self.ledger.clone();
                let player = player.clone();
                async move {
                    let balance = match ledger
                        .get_round_end_balance(game_id, round, &player)
                        .await
                    {
                        Ok(b) => Some(b),
                        Err(e) => {
                            warn!(game=%game_id, round, player=%player, error=%e, "End balance unavailable");
                            None
                        }
                    };
                    (player, round, balance)
                }
            })
        });

        join_all(reads).await
    }

    async fn scan_start_balances(
        &self,
        game_id: GameId,
        max_round: u32,
        players: &[Address],
    ) -> Vec<(Address, BTreeMap<u32, Amount>)> {
        let scans = players.iter().map(|player| {
            let ledger = self.ledger.clone();
            let player = player.clone();
            async move {
                let starts = scan_contiguous_starts(ledger.as_ref(), game_id, max_round, &player).await;
                (player, starts)
            }
        });

        join_all(scans).await
    }
}

/// Reads start balances for rounds 1, 2, ... until the first zero, absent
/// or failed read. Later rounds are never consulted past that point.
async fn scan_contiguous_starts(
    ledger: &dyn Ledger,
    game_id: GameId,
    max_round: u32,
    player: &Address,
) -> BTreeMap<u32, Amount> {
    let mut starts = BTreeMap::new();
    for round in 1..=max_round {
        match ledger.get_round_start_balance(game_id, round, player).await {
            Ok(balance) if !balance.is_zero() => {
                starts.insert(round, balance);
            }
            Ok(_) => break,
            Err(e) => {
                warn!(game=%game_id, round, player=%player, error=%e, "Start balance unavailable");
                break;
            }
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MockFailure, MockLedger};

    fn addr(n: u8) -> Address {
        Address::new(format!("0x{:040x}", n))
    }

    fn round(number: u32, finalized: bool) -> Round {
        Round {
            number,
            start_time: 0,
            end_time: 0,
            alive_count_at_start: 2,
            cutoff_rank: 1,
            finalized,
        }
    }

    #[tokio::test]
    async fn test_zero_end_kept_only_for_finalized_rounds() {
        let game = GameId(1);
        let p = addr(1);
        let ledger = MockLedger::new()
            .with_round(game, round(1, true))
            .with_round(game, round(2, false))
            .with_start_balance(game, 1, &p, 100);
        // End balances unset: both read as zero.
        let collector = SnapshotCollector::new(Arc::new(ledger));
        let set = collector.collect(game, 2, &[p.clone()]).await;

        let snaps = set.player(&p).unwrap();
        assert_eq!(snaps.end(1), Some(Amount::ZERO));
        assert_eq!(snaps.end(2), None);
        assert_eq!(set.finalized_rounds, BTreeSet::from([1]));
    }

    #[tokio::test]
    async fn test_player_without_entries_excluded() {
        let game = GameId(1);
        let ledger = MockLedger::new().with_round(game, round(1, false));
        let collector = SnapshotCollector::new(Arc::new(ledger));
        let set = collector.collect(game, 1, &[addr(1)]).await;
        assert!(set.players.is_empty());
    }

    #[tokio::test]
    async fn test_failed_start_read_ends_scan() {
        let game = GameId(1);
        let p = addr(1);
        let ledger = MockLedger::new()
            .with_start_balance(game, 1, &p, 100)
            .with_start_balance(game, 2, &p, 110)
            .with_start_balance(game, 3, &p, 120)
            .with_failure(MockFailure::StartBalance(2, p.clone()));
        let collector = SnapshotCollector::new(Arc::new(ledger));
        let set = collector.collect(game, 3, &[p.clone()]).await;

        let snaps = set.player(&p).unwrap();
        assert_eq!(snaps.starts.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_round_metadata_is_skipped() {
        let game = GameId(1);
        let p = addr(1);
        let ledger = MockLedger::new()
            .with_round(game, round(1, true))
            .with_round(game, round(2, true))
            .with_failure(MockFailure::Round(2))
            .with_start_balance(game, 1, &p, 100)
            .with_end_balance(game, 1, &p, 90);
        let collector = SnapshotCollector::new(Arc::new(ledger));
        let set = collector.collect(game, 2, &[p.clone()]).await;

        assert!(set.round(1).is_some());
        assert!(set.round(2).is_none());
        // Round 2 not known to be finalized, so its zero end is dropped.
        assert_eq!(set.player(&p).unwrap().end(2), None);
        assert_eq!(set.player(&p).unwrap().last_end(), Some((1, Amount::new(90))));
    }
}
