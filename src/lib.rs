pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod orchestration;

pub use config::Config;
pub use domain::{
    Address, Amount, BlockNumber, BlockRange, Game, GameId, PayoutRecord, PlayerRecord, Round,
    TxRef,
};
pub use engine::{
    compute_gain, EliminationProjection, Gain, GameResult, Placement, PlacementSource,
    RankedEntry, RoundStandings,
};
pub use error::AppError;
pub use ledger::{GatewayLedger, Ledger, LedgerError, MockLedger};
pub use orchestration::{GameStatus, GameView, Orchestrator, ViewPoller, ViewStore};
