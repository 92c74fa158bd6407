use crate::domain::{Address, Amount, Game, GameId, PlayerRecord};
use crate::engine::placement::PlacementResolver;
use crate::engine::projection::{live_candidates, project};
use crate::engine::ranking::round_standings;
use crate::engine::{
    EliminationProjection, GameResult, PayoutLocator, PayoutSearchConfig, RoundStandings,
    SnapshotCollector, SnapshotSet,
};
use crate::ledger::{Ledger, LedgerError};
use futures::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    /// Registration open; no rounds yet.
    Pending,
    Live,
    Finalized,
    Cancelled,
}

/// Complete derived view of one game at one poll.
///
/// Built in full before it is handed out; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub game: Game,
    pub status: GameStatus,
    /// Player records in registration order.
    pub players: Vec<PlayerRecord>,
    /// Standings for every finalized round.
    pub rounds: Vec<RoundStandings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<EliminationProjection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
    /// SHA-256 of the canonical JSON of every other field.
    pub fingerprint: String,
}

impl GameView {
    fn assemble(
        game: Game,
        status: GameStatus,
        players: Vec<PlayerRecord>,
        rounds: Vec<RoundStandings>,
        projection: Option<EliminationProjection>,
        result: Option<GameResult>,
    ) -> Self {
        let fingerprint = fingerprint(&(&game, status, &players, &rounds, &projection, &result));
        Self {
            game,
            status,
            players,
            rounds,
            projection,
            result,
            fingerprint,
        }
    }

    pub fn round(&self, number: u32) -> Option<&RoundStandings> {
        self.rounds.iter().find(|r| r.round == number)
    }
}

fn fingerprint<T: Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("game {0} not found")]
    GameNotFound(GameId),
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(LedgerError),
}

/// Assembles game views from ledger reads and the engine components.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    ledger: Arc<dyn Ledger>,
    collector: SnapshotCollector,
    resolver: PlacementResolver,
}

impl Orchestrator {
    pub fn new(ledger: Arc<dyn Ledger>, payout_search: PayoutSearchConfig) -> Self {
        let collector = SnapshotCollector::new(ledger.clone());
        let resolver = PlacementResolver::new(PayoutLocator::new(ledger.clone(), payout_search));
        Self {
            ledger,
            collector,
            resolver,
        }
    }

    /// Build the view of a game as of now.
    pub async fn build_view(&self, game_id: GameId) -> Result<GameView, OrchestrationError> {
        self.build_view_at(game_id, chrono::Utc::now().timestamp())
            .await
    }

    /// Build the view of a game with `now` (unix seconds) as the wall clock.
    pub async fn build_view_at(
        &self,
        game_id: GameId,
        now: i64,
    ) -> Result<GameView, OrchestrationError> {
        let game = self.ledger.get_game(game_id).await.map_err(|e| match e {
            LedgerError::NotFound(_) => OrchestrationError::GameNotFound(game_id),
            other => OrchestrationError::LedgerUnavailable(other),
        })?;

        let addresses = self
            .ledger
            .get_players(game_id)
            .await
            .map_err(OrchestrationError::LedgerUnavailable)?;

        let players = self.read_player_records(game_id, &addresses).await;

        if game.cancelled {
            return Ok(GameView::assemble(
                game,
                GameStatus::Cancelled,
                players,
                Vec::new(),
                None,
                None,
            ));
        }
        if !game.started() {
            return Ok(GameView::assemble(
                game,
                GameStatus::Pending,
                players,
                Vec::new(),
                None,
                None,
            ));
        }

        let snapshots = self
            .collector
            .collect(game_id, game.max_scan_round(), &addresses)
            .await;

        let rounds: Vec<RoundStandings> = snapshots
            .rounds
            .values()
            .filter(|r| r.finalized)
            .map(|r| round_standings(r, &snapshots, &players))
            .collect();

        if game.finalized {
            let result = self.resolver.resolve(&game, &players, &snapshots).await;
            return Ok(GameView::assemble(
                game,
                GameStatus::Finalized,
                players,
                rounds,
                None,
                Some(result),
            ));
        }

        let projection = self.project_current_round(&game, &players, &snapshots, now).await;
        Ok(GameView::assemble(
            game,
            GameStatus::Live,
            players,
            rounds,
            projection,
            None,
        ))
    }

    async fn read_player_records(
        &self,
        game_id: GameId,
        addresses: &[Address],
    ) -> Vec<PlayerRecord> {
        let reads = addresses.iter().map(|addr| {
            let ledger = self.ledger.clone();
            async move { (addr, ledger.get_player_record(game_id, addr).await) }
        });

        let mut records: Vec<PlayerRecord> = join_all(reads)
            .await
            .into_iter()
            .filter_map(|(addr, result)| match result {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(game=%game_id, player=%addr, error=%e, "Player record unavailable");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| {
            a.square_index
                .cmp(&b.square_index)
                .then_with(|| a.address.cmp(&b.address))
        });
        records
    }

    async fn project_current_round(
        &self,
        game: &Game,
        players: &[PlayerRecord],
        snapshots: &SnapshotSet,
        now: i64,
    ) -> Option<EliminationProjection> {
        let round = snapshots.round(game.current_round)?;
        if round.finalized || !round.timer_expired(now) {
            debug!(game=%game.id, round = round.number, "Round not awaiting finalization");
            return None;
        }

        let alive: Vec<&PlayerRecord> = players.iter().filter(|p| p.alive).collect();
        let current = self.read_current_balances(&alive).await;
        let candidates = live_candidates(round.number, &alive, snapshots, &current);
        Some(project(round, game.total_rounds, candidates))
    }

    async fn read_current_balances(
        &self,
        players: &[&PlayerRecord],
    ) -> BTreeMap<Address, Option<Amount>> {
        let reads = players.iter().map(|record| {
            let ledger = self.ledger.clone();
            let player = record.address.clone();
            async move {
                let balance = match ledger.get_current_balance(&player).await {
                    Ok(b) => Some(b),
                    Err(e) => {
                        warn!(player=%player, error=%e, "Current balance unavailable");
                        None
                    }
                };
                (player, balance)
            }
        });

        join_all(reads).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Round;
    use crate::ledger::{MockFailure, MockLedger};

    fn addr(n: u8) -> Address {
        Address::new(format!("0x{:040x}", n))
    }

    fn game(id: u64) -> Game {
        Game {
            id: GameId(id),
            total_rounds: 2,
            current_round: 1,
            start_time: 1_000,
            finalized: false,
            cancelled: false,
            entry_fee: Amount::new(100),
            player_count: 2,
            prize_pool: Amount::ZERO,
        }
    }

    fn record(n: u8) -> PlayerRecord {
        PlayerRecord {
            address: addr(n),
            square_index: u32::from(n),
            alive: true,
            elimination_round: 0,
        }
    }

    fn orchestrator(ledger: MockLedger) -> Orchestrator {
        Orchestrator::new(Arc::new(ledger), PayoutSearchConfig::default())
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let err = orchestrator(MockLedger::new())
            .build_view(GameId(5))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::GameNotFound(GameId(5))));
    }

    #[tokio::test]
    async fn test_unreadable_player_list_is_unavailable() {
        let ledger = MockLedger::new()
            .with_game(game(1))
            .with_failure(MockFailure::Players);
        let err = orchestrator(ledger).build_view(GameId(1)).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_player_record_is_skipped() {
        let ledger = MockLedger::new()
            .with_game(game(1))
            .with_player(GameId(1), record(1))
            .with_player(GameId(1), record(2))
            .with_failure(MockFailure::Record(addr(2)));
        let view = orchestrator(ledger).build_view_at(GameId(1), 0).await.unwrap();
        assert_eq!(view.status, GameStatus::Live);
        assert_eq!(view.players.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_game_has_no_result() {
        let mut g = game(1);
        g.cancelled = true;
        let ledger = MockLedger::new().with_game(g);
        let view = orchestrator(ledger).build_view(GameId(1)).await.unwrap();
        assert_eq!(view.status, GameStatus::Cancelled);
        assert!(view.result.is_none());
        assert!(view.projection.is_none());
    }

    #[tokio::test]
    async fn test_projection_only_after_timer() {
        let round = Round {
            number: 1,
            start_time: 1_000,
            end_time: 2_000,
            alive_count_at_start: 2,
            cutoff_rank: 1,
            finalized: false,
        };
        let ledger = MockLedger::new()
            .with_game(game(1))
            .with_round(GameId(1), round)
            .with_player(GameId(1), record(1))
            .with_player(GameId(1), record(2))
            .with_start_balance(GameId(1), 1, &addr(1), 100)
            .with_start_balance(GameId(1), 1, &addr(2), 100)
            .with_current_balance(&addr(1), 90)
            .with_current_balance(&addr(2), 120);
        let orchestrator = orchestrator(ledger);

        let before = orchestrator.build_view_at(GameId(1), 1_999).await.unwrap();
        assert!(before.projection.is_none());

        let after = orchestrator.build_view_at(GameId(1), 2_000).await.unwrap();
        let projection = after.projection.unwrap();
        assert_eq!(projection.eliminated, vec![addr(1)]);
        assert!(projection.game_ends_after_round);
    }

    #[tokio::test]
    async fn test_fingerprint_stable_across_builds() {
        let ledger = MockLedger::new()
            .with_game(game(1))
            .with_player(GameId(1), record(1));
        let orchestrator = orchestrator(ledger);
        let a = orchestrator.build_view_at(GameId(1), 0).await.unwrap();
        let b = orchestrator.build_view_at(GameId(1), 0).await.unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }
}
