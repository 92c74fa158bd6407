//! In-memory ledger for tests without network calls.

use super::{Ledger, LedgerError, PayoutScope};
use crate::domain::{
    Address, Amount, BlockNumber, Game, GameId, PayoutRecord, PlayerRecord, Round, TxRef,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A read that the mock should fail with a network error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MockFailure {
    Game,
    Players,
    Round(u32),
    Record(Address),
    StartBalance(u32, Address),
    EndBalance(u32, Address),
    CurrentBalance(Address),
    FinalizeTx,
    LatestBlock,
    Payouts,
}

/// Mock ledger that returns predefined state.
///
/// Unset balances read as zero, matching how the ledger reports
/// snapshots that were never written.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    games: HashMap<GameId, Game>,
    rounds: HashMap<(GameId, u32), Round>,
    players: HashMap<GameId, Vec<Address>>,
    records: HashMap<(GameId, Address), PlayerRecord>,
    start_balances: HashMap<(GameId, u32, Address), Amount>,
    end_balances: HashMap<(GameId, u32, Address), Amount>,
    current_balances: HashMap<Address, Amount>,
    finalize_txs: HashMap<GameId, TxRef>,
    payouts: HashMap<GameId, Vec<PayoutRecord>>,
    latest_block: BlockNumber,
    max_block_range: Option<u64>,
    hide_max_block_range: bool,
    failures: HashSet<MockFailure>,
    latency: Option<Duration>,
    payout_queries: Arc<Mutex<Vec<PayoutScope>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game(mut self, game: Game) -> Self {
        self.games.insert(game.id, game);
        self
    }

    pub fn with_round(mut self, game_id: GameId, round: Round) -> Self {
        self.rounds.insert((game_id, round.number), round);
        self
    }

    /// Register a player and its status record.
    pub fn with_player(mut self, game_id: GameId, record: PlayerRecord) -> Self {
        self.players
            .entry(game_id)
            .or_default()
            .push(record.address.clone());
        self.records
            .insert((game_id, record.address.clone()), record);
        self
    }

    pub fn with_start_balance(
        mut self,
        game_id: GameId,
        round: u32,
        player: &Address,
        amount: u128,
    ) -> Self {
        self.start_balances
            .insert((game_id, round, player.clone()), Amount::new(amount));
        self
    }

    pub fn with_end_balance(
        mut self,
        game_id: GameId,
        round: u32,
        player: &Address,
        amount: u128,
    ) -> Self {
        self.end_balances
            .insert((game_id, round, player.clone()), Amount::new(amount));
        self
    }

    pub fn with_current_balance(mut self, player: &Address, amount: u128) -> Self {
        self.current_balances
            .insert(player.clone(), Amount::new(amount));
        self
    }

    pub fn with_finalize_tx(mut self, game_id: GameId, tx: TxRef) -> Self {
        self.finalize_txs.insert(game_id, tx);
        self
    }

    pub fn with_payout(mut self, game_id: GameId, record: PayoutRecord) -> Self {
        self.payouts.entry(game_id).or_default().push(record);
        self
    }

    pub fn with_latest_block(mut self, block: u64) -> Self {
        self.latest_block = BlockNumber(block);
        self
    }

    /// Reject block searches wider than `max` blocks.
    pub fn with_max_block_range(mut self, max: u64) -> Self {
        self.max_block_range = Some(max);
        self
    }

    /// Reject block searches wider than `max` blocks without saying what
    /// the limit is.
    pub fn with_max_block_range_hidden(mut self, max: u64) -> Self {
        self.max_block_range = Some(max);
        self.hide_max_block_range = true;
        self
    }

    pub fn with_failure(mut self, failure: MockFailure) -> Self {
        self.failures.insert(failure);
        self
    }

    /// Delay every read by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Payout scopes queried so far, in call order.
    pub fn payout_queries(&self) -> Vec<PayoutScope> {
        self.payout_queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    async fn read(&self, failure: MockFailure) -> Result<(), LedgerError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failures.contains(&failure) {
            return Err(LedgerError::NetworkError(format!(
                "injected failure: {:?}",
                failure
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn get_game(&self, game_id: GameId) -> Result<Game, LedgerError> {
        self.read(MockFailure::Game).await?;
        self.games
            .get(&game_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("game {}", game_id)))
    }

    async fn get_round(&self, game_id: GameId, round: u32) -> Result<Round, LedgerError> {
        self.read(MockFailure::Round(round)).await?;
        Ok(self
            .rounds
            .get(&(game_id, round))
            .cloned()
            .unwrap_or(Round {
                number: round,
                start_time: 0,
                end_time: 0,
                alive_count_at_start: 0,
                cutoff_rank: 0,
                finalized: false,
            }))
    }

    async fn get_players(&self, game_id: GameId) -> Result<Vec<Address>, LedgerError> {
        self.read(MockFailure::Players).await?;
        Ok(self.players.get(&game_id).cloned().unwrap_or_default())
    }

    async fn get_player_record(
        &self,
        game_id: GameId,
        player: &Address,
    ) -> Result<PlayerRecord, LedgerError> {
        self.read(MockFailure::Record(player.clone())).await?;
        self.records
            .get(&(game_id, player.clone()))
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("player {}", player)))
    }

    async fn get_round_start_balance(
        &self,
        game_id: GameId,
        round: u32,
        player: &Address,
    ) -> Result<Amount, LedgerError> {
        self.read(MockFailure::StartBalance(round, player.clone()))
            .await?;
        Ok(self
            .start_balances
            .get(&(game_id, round, player.clone()))
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    async fn get_round_end_balance(
        &self,
        game_id: GameId,
        round: u32,
        player: &Address,
    ) -> Result<Amount, LedgerError> {
        self.read(MockFailure::EndBalance(round, player.clone()))
            .await?;
        Ok(self
            .end_balances
            .get(&(game_id, round, player.clone()))
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    async fn get_current_balance(&self, player: &Address) -> Result<Amount, LedgerError> {
        self.read(MockFailure::CurrentBalance(player.clone()))
            .await?;
        Ok(self
            .current_balances
            .get(player)
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    async fn get_finalize_tx(&self, game_id: GameId) -> Result<Option<TxRef>, LedgerError> {
        self.read(MockFailure::FinalizeTx).await?;
        Ok(self.finalize_txs.get(&game_id).cloned())
    }

    async fn latest_block(&self) -> Result<BlockNumber, LedgerError> {
        self.read(MockFailure::LatestBlock).await?;
        Ok(self.latest_block)
    }

    async fn get_payout_records(
        &self,
        game_id: GameId,
        scope: &PayoutScope,
    ) -> Result<Vec<PayoutRecord>, LedgerError> {
        if let Ok(mut queries) = self.payout_queries.lock() {
            queries.push(scope.clone());
        }
        self.read(MockFailure::Payouts).await?;

        let records = self.payouts.get(&game_id).cloned().unwrap_or_default();
        match scope {
            PayoutScope::Transaction(tx) => Ok(records
                .into_iter()
                .filter(|r| &r.tx_ref == tx)
                .collect()),
            PayoutScope::Blocks(range) => {
                if let Some(max) = self.max_block_range {
                    if range.len() > max {
                        return Err(LedgerError::BlockRangeExceeded {
                            max_range: (!self.hide_max_block_range).then_some(max),
                        });
                    }
                }
                Ok(records
                    .into_iter()
                    .filter(|r| range.contains(r.block_number))
                    .collect())
            }
        }
    }
}
