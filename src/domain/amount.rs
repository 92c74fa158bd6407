//! Token amounts in ledger base units.
//!
//! Amounts are exact unsigned integers. Conversion to a human-readable
//! decimal is done with rust_decimal and only for display.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Denominator for basis-point arithmetic (100.00%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Token quantity in base units (e.g. wei).
///
/// Serializes to a JSON string so values above 2^53 survive the trip to
/// JavaScript consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(base_units: u128) -> Self {
        Amount(base_units)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self * bps / 10000`, truncating. Falls back to dividing first when
    /// the product would overflow.
    pub fn bps_share(&self, bps: u128) -> Amount {
        match self.0.checked_mul(bps) {
            Some(product) => Amount(product / BPS_DENOMINATOR),
            None => Amount((self.0 / BPS_DENOMINATOR).saturating_mul(bps)),
        }
    }

    pub fn saturating_mul(&self, factor: u128) -> Amount {
        Amount(self.0.saturating_mul(factor))
    }

    /// Whole-token decimal representation, e.g. `600000000000000000` with
    /// 18 decimals becomes `0.6`. Returns None when the value does not fit
    /// rust_decimal's 96-bit mantissa.
    pub fn to_decimal(&self, decimals: u32) -> Option<Decimal> {
        let value = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(value, decimals)
            .ok()
            .map(|d| d.normalize())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Amount)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
