//! Discovery of authoritative payout records for a finalized game.
//!
//! The finalize transaction is checked first since its emitted records are
//! exact and need no block range. Otherwise a bounded backwards search over
//! block windows is run; windows the host rejects as too wide are halved and
//! retried.

use crate::domain::{BlockRange, GameId, PayoutRecord};
use crate::ledger::{Ledger, LedgerError, PayoutScope};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutSearchConfig {
    /// Initial window size in blocks.
    pub chunk_blocks: u64,
    /// How far back from the latest block to search.
    pub lookback_blocks: u64,
    /// Upper bound on ledger queries per search.
    pub max_attempts: u32,
}

impl Default for PayoutSearchConfig {
    fn default() -> Self {
        Self {
            chunk_blocks: 10_000,
            lookback_blocks: 500_000,
            max_attempts: 256,
        }
    }
}

/// Finds payout records emitted by the ledger for a game.
#[derive(Debug, Clone)]
pub struct PayoutLocator {
    ledger: Arc<dyn Ledger>,
    config: PayoutSearchConfig,
}

impl PayoutLocator {
    pub fn new(ledger: Arc<dyn Ledger>, config: PayoutSearchConfig) -> Self {
        Self { ledger, config }
    }

    /// Payout records sorted by place, or empty when none could be found.
    ///
    /// Never fails: unavailability falls through to the computed path.
    pub async fn locate(&self, game_id: GameId) -> Vec<PayoutRecord> {
        let mut records = match self.from_finalize_tx(game_id).await {
            Some(records) => records,
            None => self.search_blocks(game_id).await,
        };
        records.sort_by(|a, b| a.place.cmp(&b.place).then_with(|| a.winner.cmp(&b.winner)));
        records
    }

    async fn from_finalize_tx(&self, game_id: GameId) -> Option<Vec<PayoutRecord>> {
        let tx = match self.ledger.get_finalize_tx(game_id).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return None,
            Err(e) => {
                warn!(game=%game_id, error=%e, "Finalize tx lookup failed");
                return None;
            }
        };

        match self
            .ledger
            .get_payout_records(game_id, &PayoutScope::Transaction(tx.clone()))
            .await
        {
            Ok(records) if !records.is_empty() => Some(records),
            Ok(_) => {
                debug!(game=%game_id, tx=%tx, "Finalize tx emitted no payout records");
                None
            }
            Err(e) => {
                warn!(game=%game_id, tx=%tx, error=%e, "Payout records for finalize tx unavailable");
                None
            }
        }
    }

    async fn search_blocks(&self, game_id: GameId) -> Vec<PayoutRecord> {
        let latest = match self.ledger.latest_block().await {
            Ok(b) => b.as_u64(),
            Err(e) => {
                warn!(game=%game_id, error=%e, "Latest block unavailable; skipping payout search");
                return Vec::new();
            }
        };
        let floor = latest.saturating_sub(self.config.lookback_blocks);
        let mut window = self.config.chunk_blocks.max(1);
        let mut to = latest;
        let mut attempts = 0u32;

        loop {
            if attempts >= self.config.max_attempts {
                warn!(game=%game_id, attempts, "Payout search attempt budget exhausted");
                return Vec::new();
            }
            attempts += 1;

            let from = to.saturating_sub(window - 1).max(floor);
            let range = BlockRange::new(from, to);

            match self
                .ledger
                .get_payout_records(game_id, &PayoutScope::Blocks(range))
                .await
            {
                Ok(records) if !records.is_empty() => return records,
                Ok(_) => {}
                Err(LedgerError::BlockRangeExceeded { max_range }) => {
                    if window == 1 {
                        warn!(game=%game_id, "Host rejects single-block payout search");
                        return Vec::new();
                    }
                    window = max_range
                        .filter(|max| *max > 0 && *max < window)
                        .unwrap_or(window / 2)
                        .max(1);
                    debug!(game=%game_id, window, "Narrowing payout search window");
                    continue;
                }
                Err(e) => {
                    warn!(game=%game_id, from, to, error=%e, "Payout search window failed; skipping");
                }
            }

            if from <= floor {
                return Vec::new();
            }
            to = from - 1;
        }
    }
}
