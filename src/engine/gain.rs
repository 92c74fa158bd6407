//! Fixed-point percentage gain between two balances.
//!
//! Gains are integer basis points computed as `(end - start) * 10000 / start`
//! with truncating division, the same convention the ledger uses, so values
//! can be cross-checked against ledger-side decisions exactly.

use crate::domain::{Amount, BPS_DENOMINATOR};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis points representing -100.00%.
pub const TOTAL_LOSS_BPS: i64 = -(BPS_DENOMINATOR as i64);

/// Gain of a player over some window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "basisPoints", rename_all = "camelCase")]
pub enum Gain {
    /// Fixed-point gain in basis points (5000 = +50.00%).
    Value(i64),
    /// Balance grew from a zero baseline.
    Unbounded,
    /// Balance went to zero from a zero baseline; ranks as -100.00%.
    TotalLoss,
    /// No baseline or no end value.
    Unavailable,
}

impl Gain {
    /// Key used for ordering: higher ranks first.
    ///
    /// `TotalLoss` shares its key with `Value(-10000)` so the two tie.
    pub fn rank_key(&self) -> (u8, i64) {
        match self {
            Gain::Unbounded => (3, 0),
            Gain::Value(bps) => (2, *bps),
            Gain::TotalLoss => (2, TOTAL_LOSS_BPS),
            Gain::Unavailable => (0, 0),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Gain::Unavailable)
    }

    /// Percentage with two decimals, e.g. `33.33`. None unless finite.
    pub fn percent(&self) -> Option<Decimal> {
        match self {
            Gain::Value(bps) => Some(Decimal::new(*bps, 2)),
            Gain::TotalLoss => Some(Decimal::new(TOTAL_LOSS_BPS, 2)),
            Gain::Unbounded | Gain::Unavailable => None,
        }
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.percent()) {
            (Gain::Unbounded, _) => write!(f, "unbounded"),
            (Gain::Unavailable, _) => write!(f, "unavailable"),
            (_, Some(pct)) if pct.is_sign_positive() && !pct.is_zero() => write!(f, "+{}%", pct),
            (_, Some(pct)) => write!(f, "{}%", pct),
            (_, None) => write!(f, "unavailable"),
        }
    }
}

/// Gain from `start` to `end`.
///
/// Returns [`Gain::Unavailable`] for a zero baseline or when the arithmetic
/// does not fit; never a fabricated zero.
pub fn compute_gain(start: Amount, end: Amount) -> Gain {
    if start.is_zero() {
        return Gain::Unavailable;
    }
    let (Ok(start), Ok(end)) = (
        i128::try_from(start.as_u128()),
        i128::try_from(end.as_u128()),
    ) else {
        return Gain::Unavailable;
    };

    // i128 division truncates toward zero.
    (end - start)
        .checked_mul(BPS_DENOMINATOR as i128)
        .map(|scaled| scaled / start)
        .and_then(|bps| i64::try_from(bps).ok())
        .map(Gain::Value)
        .unwrap_or(Gain::Unavailable)
}

/// Gain for live projection, where a zero baseline still has to rank.
///
/// A zero or missing baseline maps to [`Gain::Unbounded`] when the current
/// balance is positive and to [`Gain::TotalLoss`] when it is zero.
pub fn compute_live_gain(baseline: Option<Amount>, current: Option<Amount>) -> Gain {
    let Some(current) = current else {
        return Gain::Unavailable;
    };
    match baseline {
        Some(start) if !start.is_zero() => compute_gain(start, current),
        _ if current.is_zero() => Gain::TotalLoss,
        _ => Gain::Unbounded,
    }
}
