//! Read-only ledger abstraction for game, round, balance and payout queries.

use crate::domain::{Address, Amount, BlockNumber, BlockRange, Game, GameId, PayoutRecord, PlayerRecord, Round, TxRef};
use async_trait::async_trait;
use std::fmt;

pub mod gateway;
pub mod mock;

pub use gateway::GatewayLedger;
pub use mock::{MockFailure, MockLedger};

/// Where to look for payout records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutScope {
    /// Records emitted by one specific transaction (the game's finalize tx).
    Transaction(TxRef),
    /// Event search over an inclusive block window.
    Blocks(BlockRange),
}

/// Ledger trait for reading arena state.
///
/// Every method is a pure read against the ledger's current height.
/// Implementations own transport concerns (retry, backoff, rate limiting);
/// callers treat any error as "no data for this cell".
#[async_trait]
pub trait Ledger: Send + Sync + fmt::Debug {
    /// Fetch the game header.
    async fn get_game(&self, game_id: GameId) -> Result<Game, LedgerError>;

    /// Fetch metadata for a single round (1-based).
    async fn get_round(&self, game_id: GameId, round: u32) -> Result<Round, LedgerError>;

    /// Fetch registered player addresses in registration order.
    async fn get_players(&self, game_id: GameId) -> Result<Vec<Address>, LedgerError>;

    /// Fetch a player's status record.
    async fn get_player_record(
        &self,
        game_id: GameId,
        player: &Address,
    ) -> Result<PlayerRecord, LedgerError>;

    /// Balance recorded when `round` started. Zero when no snapshot exists.
    async fn get_round_start_balance(
        &self,
        game_id: GameId,
        round: u32,
        player: &Address,
    ) -> Result<Amount, LedgerError>;

    /// Balance recorded when `round` was finalized. Zero when no snapshot exists.
    async fn get_round_end_balance(
        &self,
        game_id: GameId,
        round: u32,
        player: &Address,
    ) -> Result<Amount, LedgerError>;

    /// Instantaneous balance of a player.
    async fn get_current_balance(&self, player: &Address) -> Result<Amount, LedgerError>;

    /// Hash of the transaction that finalized the game, if known.
    async fn get_finalize_tx(&self, game_id: GameId) -> Result<Option<TxRef>, LedgerError>;

    /// Current ledger height.
    async fn latest_block(&self) -> Result<BlockNumber, LedgerError>;

    /// Payout records for a game within the given scope.
    ///
    /// Block searches wider than the host allows fail with
    /// [`LedgerError::BlockRangeExceeded`].
    async fn get_payout_records(
        &self,
        game_id: GameId,
        scope: &PayoutScope,
    ) -> Result<Vec<PayoutRecord>, LedgerError>;
}

/// Error type for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error after retries)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// Event search window wider than the host accepts
    BlockRangeExceeded { max_range: Option<u64> },
    /// Entity does not exist on the ledger
    NotFound(String),
    /// Other error
    Other(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LedgerError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            LedgerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            LedgerError::RateLimited => write!(f, "Rate limited"),
            LedgerError::BlockRangeExceeded { max_range: Some(max) } => {
                write!(f, "Block range exceeded (max {})", max)
            }
            LedgerError::BlockRangeExceeded { max_range: None } => {
                write!(f, "Block range exceeded")
            }
            LedgerError::NotFound(what) => write!(f, "Not found: {}", what),
            LedgerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}
