//! Round resolution and placement engine.
//!
//! Everything here except snapshot collection and payout discovery is a
//! pure function over immutable inputs.

pub mod gain;
pub mod payouts;
pub mod placement;
pub mod projection;
pub mod ranking;
pub mod snapshots;

pub use gain::{compute_gain, compute_live_gain, Gain};
pub use payouts::{PayoutLocator, PayoutSearchConfig};
pub use placement::{GameResult, Loser, Placement, PlacementResolver, PlacementSource};
pub use projection::{EliminationProjection, ProjectionAnomaly};
pub use ranking::{rank, RankInput, RankedEntry, RoundStandings};
pub use snapshots::{PlayerSnapshots, SnapshotCollector, SnapshotSet};
