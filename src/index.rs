// 4.0: index model. pure computation of the four per-market indices from the pool's
// own indices, the configured cursor/reserve factor, and the current delta state.
// 4.0 has the state struct, 4.1 the growth factors, 4.2 the refresh itself.
//
// the peer indices track a synthetic rate between the pool's supply and borrow rates.
// delta-backed peer claims are not entitled to that rate: the delta weight drags the
// affected side back toward the pool's own growth in proportion to how much of the
// side's peer amount is pool-backed.

use crate::delta::DeltaState;
use crate::types::{checked_div, checked_mul, ArithmeticError, Index, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketIndexState {
    pub pool_supply_index: Index,
    pub pool_borrow_index: Index,
    pub peer_supply_index: Index,
    pub peer_borrow_index: Index,
    /// Pool indices as of the refresh before last, kept for audit/introspection.
    pub last_pool_supply_index: Index,
    pub last_pool_borrow_index: Index,
    pub last_update: Timestamp,
}

impl MarketIndexState {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            pool_supply_index: Index::one(),
            pool_borrow_index: Index::one(),
            peer_supply_index: Index::one(),
            peer_borrow_index: Index::one(),
            last_pool_supply_index: Index::one(),
            last_pool_borrow_index: Index::one(),
            last_update: timestamp,
        }
    }

    pub fn pool_index(&self, side: Side) -> Index {
        match side {
            Side::Supply => self.pool_supply_index,
            Side::Borrow => self.pool_borrow_index,
        }
    }

    pub fn peer_index(&self, side: Side) -> Index {
        match side {
            Side::Supply => self.peer_supply_index,
            Side::Borrow => self.peer_borrow_index,
        }
    }

    /// Pool index of the position backing a side's delta: the supply delta is backed
    /// by a pool borrow, the borrow delta by a pool deposit.
    pub fn delta_backing_index(&self, side: Side) -> Index {
        match side {
            Side::Supply => self.pool_borrow_index,
            Side::Borrow => self.pool_supply_index,
        }
    }
}

/// Per-market rate parameters. `peer_cursor` positions the synthetic midrate between
/// the pool supply growth (0) and pool borrow growth (1); `reserve_factor` is the
/// protocol's cut of the remaining spread. Both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub peer_cursor: Decimal,
    pub reserve_factor: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    // the pool reported a lower index than the previous reading. indices are
    // monotone by contract; going backwards means the ledger can no longer trust
    // its conversions.
    #[error("pool {side} index decreased: {now} < {last}")]
    PoolIndexDecreased { side: Side, now: Index, last: Index },

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

// 4.1: per-side pool growth since the stored reading.
fn pool_growth(side: Side, now: Index, last: Index) -> Result<Decimal, IndexError> {
    if now < last {
        return Err(IndexError::PoolIndexDecreased { side, now, last });
    }
    Ok(now.growth_since(last)?)
}

// share of a side's peer amount that is delta-backed, capped at one.
fn delta_weight(
    delta_units: Decimal,
    last_pool_index: Index,
    peer_amount: Decimal,
    last_peer_index: Index,
) -> Result<Decimal, ArithmeticError> {
    if delta_units.is_zero() || peer_amount.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let backed = checked_mul(delta_units, last_pool_index.value())?;
    let total = checked_mul(peer_amount, last_peer_index.value())?;
    Ok(checked_div(backed, total)?.min(Decimal::ONE))
}

fn weighted_index(
    last_peer_index: Index,
    peer_growth: Decimal,
    pool_growth: Decimal,
    weight: Decimal,
) -> Result<Index, ArithmeticError> {
    let blended = checked_mul(Decimal::ONE - weight, peer_growth)?
        .checked_add(checked_mul(weight, pool_growth)?)
        .ok_or(ArithmeticError::Overflow)?;
    let value = checked_mul(last_peer_index.value(), blended)?;
    Index::new(value).ok_or(ArithmeticError::Underflow)
}

// 4.2: the refresh. pure: prior state + pool readings + delta state in, new state out.
// committed by the engine before any matching in the same operation.
pub fn refresh_indexes(
    state: &MarketIndexState,
    delta: &DeltaState,
    params: &IndexParams,
    pool_supply_now: Index,
    pool_borrow_now: Index,
    now: Timestamp,
) -> Result<MarketIndexState, IndexError> {
    let supply_growth = pool_growth(Side::Supply, pool_supply_now, state.pool_supply_index)?;
    let borrow_growth = pool_growth(Side::Borrow, pool_borrow_now, state.pool_borrow_index)?;

    // cursor-weighted midrate, then a reserve-factor cut of each side's share of the
    // spread. a pool paying suppliers more than it charges borrowers is a degenerate
    // state; both peer sides clamp to the borrow growth and the spread cut is moot.
    let (peer_supply_growth, peer_borrow_growth) = if supply_growth > borrow_growth {
        (borrow_growth, borrow_growth)
    } else {
        let mid_growth = checked_mul(Decimal::ONE - params.peer_cursor, supply_growth)?
            .checked_add(checked_mul(params.peer_cursor, borrow_growth)?)
            .ok_or(ArithmeticError::Overflow)?;
        let supply = mid_growth
            .checked_sub(checked_mul(params.reserve_factor, mid_growth - supply_growth)?)
            .ok_or(ArithmeticError::Overflow)?;
        let borrow = mid_growth
            .checked_add(checked_mul(params.reserve_factor, borrow_growth - mid_growth)?)
            .ok_or(ArithmeticError::Overflow)?;
        (supply, borrow)
    };

    // peer supply claims are pool-backed through the borrow delta, and vice versa
    let supply_weight = delta_weight(
        delta.borrow_delta.value(),
        state.pool_supply_index,
        delta.peer_supply_amount.value(),
        state.peer_supply_index,
    )?;
    let borrow_weight = delta_weight(
        delta.supply_delta.value(),
        state.pool_borrow_index,
        delta.peer_borrow_amount.value(),
        state.peer_borrow_index,
    )?;

    Ok(MarketIndexState {
        pool_supply_index: pool_supply_now,
        pool_borrow_index: pool_borrow_now,
        peer_supply_index: weighted_index(
            state.peer_supply_index,
            peer_supply_growth,
            supply_growth,
            supply_weight,
        )?,
        peer_borrow_index: weighted_index(
            state.peer_borrow_index,
            peer_borrow_growth,
            borrow_growth,
            borrow_weight,
        )?,
        last_pool_supply_index: state.pool_supply_index,
        last_pool_borrow_index: state.pool_borrow_index,
        last_update: now,
    })
}
