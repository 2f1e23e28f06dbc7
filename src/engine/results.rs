// 7.0.2: result types and errors for engine operations.
//
// partial matches, delta growth, and budget exhaustion are values, never errors. only
// arithmetic faults, index faults, pool faults, and bad requests abort an operation.

use crate::index::IndexError;
use crate::market::MarketError;
use crate::pool::PoolError;
use crate::types::{ArithmeticError, MarketId, Underlying};

/// Outcome of one matching or unmatching walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Amount actually matched (or unmatched), including the delta-consumed part.
    pub matched: Underlying,
    /// Portion satisfied by consuming the side's delta, at zero budget cost.
    pub from_delta: Underlying,
    /// Queue-walk iterations spent.
    pub budget_consumed: u32,
}

impl MatchOutcome {
    pub fn empty() -> Self {
        Self {
            matched: Underlying::zero(),
            from_delta: Underlying::zero(),
            budget_consumed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SupplyResult {
    pub amount: Underlying,
    /// Peer-matched part (delta consumption plus promoted borrowers).
    pub matched: Underlying,
    /// Remainder deposited into the pool.
    pub pooled: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct BorrowResult {
    pub amount: Underlying,
    pub matched: Underlying,
    /// Remainder borrowed from the pool.
    pub pooled: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawResult {
    /// Amount actually withdrawn (requests are capped at the position).
    pub amount: Underlying,
    /// Taken straight from the pool-resting bucket.
    pub from_pool: Underlying,
    /// Unwound from the peer bucket.
    pub from_peer: Underlying,
    /// Shortfall absorbed as supply delta.
    pub delta_grown: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RepayResult {
    /// Amount actually repaid (requests are capped at the debt).
    pub amount: Underlying,
    pub to_pool: Underlying,
    pub to_peer: Underlying,
    /// Shortfall absorbed as borrow delta.
    pub delta_grown: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Market {0:?} not found")]
    MarketNotFound(MarketId),

    #[error("Amount must be positive")]
    AmountIsZero,

    #[error("Nothing to withdraw or repay")]
    NothingToUnwind,

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),
}
