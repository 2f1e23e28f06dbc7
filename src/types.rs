// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, sides, amounts, accounting units, indices, timestamps. each is a newtype so the
// compiler catches unit mixups (pool units and peer units must never add directly).

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

// Supply = lending into the market. Borrow = taking liquidity out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Supply,
    Borrow,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Supply => Side::Borrow,
            Side::Borrow => Side::Supply,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Supply => write!(f, "supply"),
            Side::Borrow => write!(f, "borrow"),
        }
    }
}

// 1.1: which bucket of a balance a query refers to. pool-resting units earn the pool
// rate; peer units earn the synthetic peer rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Pool,
    Peer,
}

// 1.2: fatal arithmetic faults. the ledger never wraps or loses sign; any of these
// aborts the whole operation with no state committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArithmeticError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow below zero")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,
}

// conversions round half-up at this many decimal places
const UNIT_SCALE: u32 = 18;

fn round_units(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticError> {
    a.checked_mul(b).ok_or(ArithmeticError::Overflow)
}

pub(crate) fn checked_div(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticError> {
    if b.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    a.checked_div(b).ok_or(ArithmeticError::Overflow)
}

// 1.3: amount of the underlying asset. the only denomination that crosses the pool
// boundary. never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Underlying(Decimal);

impl Underlying {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn checked_add(self, other: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ArithmeticError> {
        let diff = self.0.checked_sub(other.0).ok_or(ArithmeticError::Overflow)?;
        if diff < Decimal::ZERO {
            return Err(ArithmeticError::Underflow);
        }
        Ok(Self(diff))
    }

    // clamps at zero instead of failing. the delta ledger boundary depends on this.
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    pub fn to_pool_units(self, index: Index) -> Result<PoolUnits, ArithmeticError> {
        checked_div(self.0, index.value()).map(|v| PoolUnits(round_units(v)))
    }

    pub fn to_peer_units(self, index: Index) -> Result<PeerUnits, ArithmeticError> {
        checked_div(self.0, index.value()).map(|v| PeerUnits(round_units(v)))
    }
}

impl fmt::Display for Underlying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: balance units resting in the external pool, denominated in the pool's own
// accounting unit. underlying = units * pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolUnits(Decimal);

impl PoolUnits {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn checked_add(self, other: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ArithmeticError> {
        let diff = self.0.checked_sub(other.0).ok_or(ArithmeticError::Overflow)?;
        if diff < Decimal::ZERO {
            return Err(ArithmeticError::Underflow);
        }
        Ok(Self(diff))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    pub fn to_underlying(self, index: Index) -> Result<Underlying, ArithmeticError> {
        checked_mul(self.0, index.value()).map(|v| Underlying(round_units(v)))
    }
}

impl fmt::Display for PoolUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.5: balance units matched peer-to-peer, denominated in the market's peer accounting
// unit. underlying = units * peer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerUnits(Decimal);

impl PeerUnits {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn checked_add(self, other: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ArithmeticError> {
        let diff = self.0.checked_sub(other.0).ok_or(ArithmeticError::Overflow)?;
        if diff < Decimal::ZERO {
            return Err(ArithmeticError::Underflow);
        }
        Ok(Self(diff))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    pub fn to_underlying(self, index: Index) -> Result<Underlying, ArithmeticError> {
        checked_mul(self.0, index.value()).map(|v| Underlying(round_units(v)))
    }
}

impl fmt::Display for PeerUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.6: a scaled exchange rate converting accounting units to underlying. starts at one
// and only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Index(Decimal);

impl Index {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn one() -> Self {
        Self(Decimal::ONE)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    // ratio of this index over an earlier reading of the same index
    pub fn growth_since(&self, last: Index) -> Result<Decimal, ArithmeticError> {
        checked_div(self.0, last.0)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.7: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn elapsed_seconds(&self, other: &Timestamp) -> Decimal {
        let diff_ms = (other.0 - self.0).abs();
        Decimal::new(diff_ms, 0) / dec!(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Supply.opposite(), Side::Borrow);
        assert_eq!(Side::Borrow.opposite(), Side::Supply);
    }

    #[test]
    fn underlying_rejects_negative() {
        assert!(Underlying::new(dec!(-1)).is_none());
        assert!(Underlying::new(dec!(0)).is_some());
    }

    #[test]
    fn checked_sub_underflows() {
        let a = Underlying::new(dec!(5)).unwrap();
        let b = Underlying::new(dec!(10)).unwrap();
        assert_eq!(a.checked_sub(b), Err(ArithmeticError::Underflow));
        assert_eq!(b.checked_sub(a).unwrap().value(), dec!(5));
    }

    #[test]
    fn saturating_sub_clamps_at_zero() {
        let a = Underlying::new(dec!(5)).unwrap();
        let b = Underlying::new(dec!(10)).unwrap();
        assert!(a.saturating_sub(b).is_zero());
        assert_eq!(b.saturating_sub(a).value(), dec!(5));
    }

    #[test]
    fn unit_conversion_round_trip() {
        let index = Index::new(dec!(1.05)).unwrap();
        let amount = Underlying::new(dec!(1000)).unwrap();

        let units = amount.to_pool_units(index).unwrap();
        let back = units.to_underlying(index).unwrap();

        // half-up rounding at 18 dp keeps the round trip within dust
        let dust = (back.value() - amount.value()).abs();
        assert!(dust < dec!(0.000000000000001), "dust {}", dust);
    }

    #[test]
    fn conversion_by_zero_index_impossible() {
        assert!(Index::new(dec!(0)).is_none());
        assert!(Index::new(dec!(-1)).is_none());
    }

    #[test]
    fn index_growth() {
        let last = Index::new(dec!(1.0)).unwrap();
        let now = Index::new(dec!(1.1)).unwrap();
        assert_eq!(now.growth_since(last).unwrap(), dec!(1.1));
    }

    #[test]
    fn elapsed_seconds() {
        let t0 = Timestamp::from_millis(0);
        let t1 = Timestamp::from_millis(86_400_000);
        assert_eq!(t0.elapsed_seconds(&t1), dec!(86400));
    }
}
