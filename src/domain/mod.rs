//! Domain types for the arena ledger view.
//!
//! This module provides:
//! - Exact token amounts (base units) with decimal display via rust_decimal
//! - Domain primitives: Address, GameId, TxRef, BlockNumber, BlockRange
//! - Ledger records: Game, Round, PlayerRecord, PayoutRecord

pub mod amount;
pub mod game;
pub mod primitives;

pub use amount::{Amount, BPS_DENOMINATOR};
pub use game::{Game, PayoutRecord, PlayerRecord, Round};
pub use primitives::{Address, AddressParseError, BlockNumber, BlockRange, GameId, TxRef};
