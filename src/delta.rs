// 3.0: delta ledger. per market, per side: the deficit of live counterparty liquidity
// ("delta") plus the running total of peer units on each side as an independent check.
//
// a delta is named for the side whose live liquidity is missing. the supply delta is
// peer borrow claims currently backed by a pool borrow (created when a withdraw runs
// out of matching budget); the borrow delta is peer supply claims backed by a pool
// deposit (created when a repay runs out). deltas are stored in pool accounting units
// of the backing position: supply delta in pool-borrow units, borrow delta in
// pool-supply units.
//
// consumption happens on new activity of the missing side and is capped at the current
// delta. the subtraction is zero-floor: concentrated flows may ask for more than the
// delta holds, and the ledger must clamp rather than underflow.

use crate::types::{ArithmeticError, Index, PeerUnits, PoolUnits, Side, Underlying};
use serde::{Deserialize, Serialize};

/// Per-market delta and peer-amount accounting. 3.1 has the state, 3.2 the mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaState {
    /// Peer borrow claims backed by a pool borrow, in pool-borrow units.
    pub supply_delta: PoolUnits,
    /// Peer supply claims backed by a pool deposit, in pool-supply units.
    pub borrow_delta: PoolUnits,
    /// Sum of all accounts' peer units on the supply side.
    pub peer_supply_amount: PeerUnits,
    /// Sum of all accounts' peer units on the borrow side.
    pub peer_borrow_amount: PeerUnits,
}

impl DeltaState {
    pub fn new() -> Self {
        Self {
            supply_delta: PoolUnits::zero(),
            borrow_delta: PoolUnits::zero(),
            peer_supply_amount: PeerUnits::zero(),
            peer_borrow_amount: PeerUnits::zero(),
        }
    }

    pub fn delta(&self, side: Side) -> PoolUnits {
        match side {
            Side::Supply => self.supply_delta,
            Side::Borrow => self.borrow_delta,
        }
    }

    pub fn peer_amount(&self, side: Side) -> PeerUnits {
        match side {
            Side::Supply => self.peer_supply_amount,
            Side::Borrow => self.peer_borrow_amount,
        }
    }

    // 3.2: consume up to `amount` of the side's delta. returns the underlying actually
    // consumed; the delta itself is reduced zero-floor so it can never go negative.
    pub fn consume(
        &mut self,
        side: Side,
        amount: Underlying,
        pool_index: Index,
    ) -> Result<Underlying, ArithmeticError> {
        let delta = self.delta(side);
        if delta.is_zero() || amount.is_zero() {
            return Ok(Underlying::zero());
        }

        let delta_underlying = delta.to_underlying(pool_index)?;
        let consumed = delta_underlying.min(amount);
        let consumed_units = consumed.to_pool_units(pool_index)?;

        let remaining = delta.saturating_sub(consumed_units);
        match side {
            Side::Supply => self.supply_delta = remaining,
            Side::Borrow => self.borrow_delta = remaining,
        }
        Ok(consumed)
    }

    // grow the side's delta by `amount` of unmatched shortfall.
    pub fn grow(
        &mut self,
        side: Side,
        amount: Underlying,
        pool_index: Index,
    ) -> Result<(), ArithmeticError> {
        if amount.is_zero() {
            return Ok(());
        }
        let units = amount.to_pool_units(pool_index)?;
        match side {
            Side::Supply => self.supply_delta = self.supply_delta.checked_add(units)?,
            Side::Borrow => self.borrow_delta = self.borrow_delta.checked_add(units)?,
        }
        Ok(())
    }

    // 3.3: peer-amount tracking. additions are checked; subtractions are zero-floor to
    // absorb conversion dust when a side unwinds completely.
    pub fn add_peer_amount(&mut self, side: Side, units: PeerUnits) -> Result<(), ArithmeticError> {
        match side {
            Side::Supply => {
                self.peer_supply_amount = self.peer_supply_amount.checked_add(units)?;
            }
            Side::Borrow => {
                self.peer_borrow_amount = self.peer_borrow_amount.checked_add(units)?;
            }
        }
        Ok(())
    }

    pub fn sub_peer_amount(&mut self, side: Side, units: PeerUnits) {
        match side {
            Side::Supply => {
                self.peer_supply_amount = self.peer_supply_amount.saturating_sub(units);
            }
            Side::Borrow => {
                self.peer_borrow_amount = self.peer_borrow_amount.saturating_sub(units);
            }
        }
    }
}

impl Default for DeltaState {
    fn default() -> Self {
        Self::new()
    }
}
