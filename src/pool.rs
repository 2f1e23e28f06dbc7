// 5.0 pool.rs: the external pooled market, interface only. custody and transfer of the
// underlying live behind this trait; the optimizer only ever sees indices and the four
// movement operations. SimPool is the deterministic stand-in used by the binary and
// the integration tests.

use crate::types::{ArithmeticError, Index, MarketId, Timestamp, Underlying};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Errors from pool operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error("Pool has no market {0:?}")]
    UnknownMarket(MarketId),

    #[error("Insufficient pool liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity {
        requested: Underlying,
        available: Underlying,
    },

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

// Trait for the underlying pooled market. Different implementations can wrap:
// - an Aave style scaled-balance pool
// - a Compound style exchange-rate pool
// - a simulated pool for testing
pub trait PoolAdapter {
    fn deposit_to_pool(&mut self, market: MarketId, amount: Underlying) -> Result<(), PoolError>;
    fn withdraw_from_pool(&mut self, market: MarketId, amount: Underlying)
        -> Result<(), PoolError>;
    fn borrow_from_pool(&mut self, market: MarketId, amount: Underlying) -> Result<(), PoolError>;
    fn repay_to_pool(&mut self, market: MarketId, amount: Underlying) -> Result<(), PoolError>;

    fn pool_supply_index(&self, market: MarketId) -> Result<Index, PoolError>;
    fn pool_borrow_index(&self, market: MarketId) -> Result<Index, PoolError>;

    // clock hook so simulated pools can accrue; real adapters ignore it
    fn sync_time(&mut self, _now: Timestamp) {}
}

/// A staged pool movement. Operations collect these while mutating a staged market
/// state and apply them only at commit, keeping each operation all-or-nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolAction {
    Deposit(Underlying),
    Withdraw(Underlying),
    Borrow(Underlying),
    Repay(Underlying),
}

impl PoolAction {
    pub fn apply<P: PoolAdapter>(
        self,
        pool: &mut P,
        market: MarketId,
    ) -> Result<(), PoolError> {
        match self {
            PoolAction::Deposit(amount) if !amount.is_zero() => {
                pool.deposit_to_pool(market, amount)
            }
            PoolAction::Withdraw(amount) if !amount.is_zero() => {
                pool.withdraw_from_pool(market, amount)
            }
            PoolAction::Borrow(amount) if !amount.is_zero() => {
                pool.borrow_from_pool(market, amount)
            }
            PoolAction::Repay(amount) if !amount.is_zero() => pool.repay_to_pool(market, amount),
            _ => Ok(()),
        }
    }
}

/// Per-market configuration of the simulated pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimPoolMarket {
    /// Per-second supply rate (e.g. 1e-9 is roughly 3.2% APR)
    pub supply_rate_per_second: Decimal,
    /// Per-second borrow rate; must not undercut the supply rate
    pub borrow_rate_per_second: Decimal,
    /// Ambient cash from other pool users the optimizer can draw on
    pub seed_liquidity: Underlying,
}

impl Default for SimPoolMarket {
    fn default() -> Self {
        Self {
            supply_rate_per_second: dec!(0.000000001),
            borrow_rate_per_second: dec!(0.000000002),
            seed_liquidity: Underlying::new(dec!(1_000_000)).unwrap_or_else(Underlying::zero),
        }
    }
}

#[derive(Debug, Clone)]
struct SimMarketState {
    config: SimPoolMarket,
    supply_index: Index,
    borrow_index: Index,
    cash: Underlying,
    borrows_outstanding: Underlying,
    last_accrual: Timestamp,
}

/// Deterministic in-memory pool. Indices compound per whole elapsed second at fixed
/// rates; liquidity is a single cash figure seeded with ambient liquidity.
#[derive(Debug, Clone)]
pub struct SimPool {
    markets: HashMap<MarketId, SimMarketState>,
    now: Timestamp,
}

impl SimPool {
    pub fn new(start: Timestamp) -> Self {
        Self {
            markets: HashMap::new(),
            now: start,
        }
    }

    pub fn add_market(&mut self, market: MarketId, config: SimPoolMarket) {
        let cash = config.seed_liquidity;
        self.markets.insert(
            market,
            SimMarketState {
                config,
                supply_index: Index::one(),
                borrow_index: Index::one(),
                cash,
                borrows_outstanding: Underlying::zero(),
                last_accrual: self.now,
            },
        );
    }

    pub fn cash(&self, market: MarketId) -> Option<Underlying> {
        self.markets.get(&market).map(|m| m.cash)
    }

    pub fn borrows_outstanding(&self, market: MarketId) -> Option<Underlying> {
        self.markets.get(&market).map(|m| m.borrows_outstanding)
    }

    fn market_mut(&mut self, market: MarketId) -> Result<&mut SimMarketState, PoolError> {
        self.markets
            .get_mut(&market)
            .ok_or(PoolError::UnknownMarket(market))
    }

    fn market(&self, market: MarketId) -> Result<&SimMarketState, PoolError> {
        self.markets
            .get(&market)
            .ok_or(PoolError::UnknownMarket(market))
    }

    fn accrue(state: &mut SimMarketState, now: Timestamp) {
        let elapsed = state.last_accrual.elapsed_seconds(&now);
        let whole_seconds = elapsed.trunc();
        if whole_seconds <= Decimal::ZERO {
            return;
        }
        let exp = whole_seconds.to_i64().unwrap_or(0);
        if exp == 0 {
            return;
        }

        let supply_factor = (Decimal::ONE + state.config.supply_rate_per_second).powi(exp);
        let borrow_factor = (Decimal::ONE + state.config.borrow_rate_per_second).powi(exp);

        if let Some(idx) = Index::new(state.supply_index.value() * supply_factor) {
            state.supply_index = idx;
        }
        if let Some(idx) = Index::new(state.borrow_index.value() * borrow_factor) {
            state.borrow_index = idx;
        }
        state.last_accrual = now;
    }
}

impl PoolAdapter for SimPool {
    fn deposit_to_pool(&mut self, market: MarketId, amount: Underlying) -> Result<(), PoolError> {
        let state = self.market_mut(market)?;
        state.cash = state.cash.checked_add(amount)?;
        Ok(())
    }

    fn withdraw_from_pool(
        &mut self,
        market: MarketId,
        amount: Underlying,
    ) -> Result<(), PoolError> {
        let state = self.market_mut(market)?;
        if amount > state.cash {
            return Err(PoolError::InsufficientLiquidity {
                requested: amount,
                available: state.cash,
            });
        }
        state.cash = state.cash.checked_sub(amount)?;
        Ok(())
    }

    fn borrow_from_pool(&mut self, market: MarketId, amount: Underlying) -> Result<(), PoolError> {
        let state = self.market_mut(market)?;
        if amount > state.cash {
            return Err(PoolError::InsufficientLiquidity {
                requested: amount,
                available: state.cash,
            });
        }
        state.cash = state.cash.checked_sub(amount)?;
        state.borrows_outstanding = state.borrows_outstanding.checked_add(amount)?;
        Ok(())
    }

    fn repay_to_pool(&mut self, market: MarketId, amount: Underlying) -> Result<(), PoolError> {
        let state = self.market_mut(market)?;
        state.cash = state.cash.checked_add(amount)?;
        state.borrows_outstanding = state.borrows_outstanding.saturating_sub(amount);
        Ok(())
    }

    fn pool_supply_index(&self, market: MarketId) -> Result<Index, PoolError> {
        Ok(self.market(market)?.supply_index)
    }

    fn pool_borrow_index(&self, market: MarketId) -> Result<Index, PoolError> {
        Ok(self.market(market)?.borrow_index)
    }

    fn sync_time(&mut self, now: Timestamp) {
        self.now = now;
        for state in self.markets.values_mut() {
            Self::accrue(state, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(v: Decimal) -> Underlying {
        Underlying::new(v).unwrap()
    }

    fn pool_with_market() -> SimPool {
        let mut pool = SimPool::new(Timestamp::from_millis(0));
        pool.add_market(MarketId(1), SimPoolMarket::default());
        pool
    }

    #[test]
    fn indices_start_at_one() {
        let pool = pool_with_market();
        assert_eq!(pool.pool_supply_index(MarketId(1)).unwrap(), Index::one());
        assert_eq!(pool.pool_borrow_index(MarketId(1)).unwrap(), Index::one());
    }

    #[test]
    fn indices_grow_with_time() {
        let mut pool = pool_with_market();
        pool.sync_time(Timestamp::from_millis(86_400_000)); // one day

        let supply = pool.pool_supply_index(MarketId(1)).unwrap();
        let borrow = pool.pool_borrow_index(MarketId(1)).unwrap();
        assert!(supply.value() > Decimal::ONE);
        // borrow rate is higher, so the borrow index leads
        assert!(borrow > supply);
    }

    #[test]
    fn indices_are_idle_without_time() {
        let mut pool = pool_with_market();
        pool.sync_time(Timestamp::from_millis(0));
        assert_eq!(pool.pool_supply_index(MarketId(1)).unwrap(), Index::one());
    }

    #[test]
    fn deposit_withdraw_moves_cash() {
        let mut pool = pool_with_market();
        let before = pool.cash(MarketId(1)).unwrap();

        pool.deposit_to_pool(MarketId(1), amt(dec!(1000))).unwrap();
        pool.withdraw_from_pool(MarketId(1), amt(dec!(400))).unwrap();

        let after = pool.cash(MarketId(1)).unwrap();
        assert_eq!(after.value(), before.value() + dec!(600));
    }

    #[test]
    fn over_withdraw_is_rejected() {
        let mut pool = pool_with_market();
        let available = pool.cash(MarketId(1)).unwrap();
        let result =
            pool.withdraw_from_pool(MarketId(1), amt(available.value() + dec!(1)));
        assert!(matches!(
            result,
            Err(PoolError::InsufficientLiquidity { .. })
        ));
    }

    #[test]
    fn borrow_and_repay_track_outstanding() {
        let mut pool = pool_with_market();

        pool.borrow_from_pool(MarketId(1), amt(dec!(500))).unwrap();
        assert_eq!(
            pool.borrows_outstanding(MarketId(1)).unwrap().value(),
            dec!(500)
        );

        pool.repay_to_pool(MarketId(1), amt(dec!(500))).unwrap();
        assert!(pool.borrows_outstanding(MarketId(1)).unwrap().is_zero());
    }

    #[test]
    fn unknown_market_errors() {
        let mut pool = SimPool::new(Timestamp::from_millis(0));
        let result = pool.deposit_to_pool(MarketId(9), amt(dec!(1)));
        assert!(matches!(result, Err(PoolError::UnknownMarket(_))));
    }
}
