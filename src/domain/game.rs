//! Ledger-side records as read by the engine.
//!
//! These are read-only projections of ledger state; nothing here is ever
//! written back.

use super::{Address, Amount, BlockNumber, GameId, TxRef};
use serde::{Deserialize, Serialize};

/// Game header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: GameId,
    pub total_rounds: u32,
    pub current_round: u32,
    /// Unix seconds; 0 until the game starts.
    pub start_time: i64,
    pub finalized: bool,
    pub cancelled: bool,
    pub entry_fee: Amount,
    pub player_count: u32,
    pub prize_pool: Amount,
}

impl Game {
    pub fn started(&self) -> bool {
        self.current_round > 0 || self.start_time > 0
    }

    /// Finalized or cancelled games never change again.
    pub fn is_settled(&self) -> bool {
        self.finalized || self.cancelled
    }

    /// Highest round worth scanning for snapshots.
    pub fn max_scan_round(&self) -> u32 {
        if self.finalized {
            self.total_rounds
        } else {
            self.current_round.max(1)
        }
    }
}

/// Per-round metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub number: u32,
    /// Unix seconds.
    pub start_time: i64,
    /// Unix seconds.
    pub end_time: i64,
    pub alive_count_at_start: u32,
    pub cutoff_rank: u32,
    pub finalized: bool,
}

impl Round {
    /// True once the round timer has lapsed at `now` (unix seconds).
    pub fn timer_expired(&self, now: i64) -> bool {
        self.end_time > 0 && now >= self.end_time
    }
}

/// Player status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub address: Address,
    /// Registration order; lower registered earlier.
    pub square_index: u32,
    pub alive: bool,
    /// 0 when never eliminated.
    pub elimination_round: u32,
}

impl PlayerRecord {
    pub fn eliminated_in(&self, round: u32) -> bool {
        round > 0 && self.elimination_round == round
    }

    /// Whether the player was still in the game when `round` started.
    pub fn alive_at_start_of(&self, round: u32) -> bool {
        self.elimination_round == 0 || self.elimination_round >= round
    }
}

/// Payout event emitted by the ledger when a game is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    pub place: u8,
    pub winner: Address,
    pub amount: Amount,
    pub tx_ref: TxRef,
    pub block_number: BlockNumber,
}
