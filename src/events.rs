// 6.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists all
// event types.

use crate::market::MarketStatus;
use crate::types::{AccountId, Index, MarketId, Side, Timestamp, Underlying};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Market lifecycle
    MarketCreated(MarketCreatedEvent),
    MarketStatusChanged(MarketStatusChangedEvent),

    // Index accrual
    IndexesRefreshed(IndexesRefreshedEvent),

    // Position flows
    Supplied(SuppliedEvent),
    Borrowed(BorrowedEvent),
    Withdrawn(WithdrawnEvent),
    Repaid(RepaidEvent),

    // Delta ledger
    DeltaConsumed(DeltaConsumedEvent),
    DeltaGrown(DeltaGrownEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCreatedEvent {
    pub market_id: MarketId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatusChangedEvent {
    pub market_id: MarketId,
    pub status: MarketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexesRefreshedEvent {
    pub market_id: MarketId,
    pub pool_supply_index: Index,
    pub pool_borrow_index: Index,
    pub peer_supply_index: Index,
    pub peer_borrow_index: Index,
}

// amount = matched + pooled for every flow event; the split is the audit trail of how
// much the optimizer paired versus routed through the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppliedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub amount: Underlying,
    pub matched: Underlying,
    pub pooled: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub amount: Underlying,
    pub matched: Underlying,
    pub pooled: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawnEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub amount: Underlying,
    pub from_pool: Underlying,
    pub from_peer: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaidEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub amount: Underlying,
    pub to_pool: Underlying,
    pub to_peer: Underlying,
    pub budget_consumed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaConsumedEvent {
    pub market_id: MarketId,
    pub side: Side,
    pub amount: Underlying,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaGrownEvent {
    pub market_id: MarketId,
    pub side: Side,
    pub amount: Underlying,
}
