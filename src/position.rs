//! Per-account balances and the per-side position store.
//!
//! A `Balance` splits one account's position on one side of a market into a
//! pool-resting bucket and a peer-matched bucket. A `SideBook` owns every balance for
//! one (market, side) together with the two queues that order them, and keeps queue
//! membership in sync with the balances: an account rests in a queue exactly while the
//! corresponding bucket is non-zero.

use crate::queue::OrderedQueue;
use crate::types::{AccountId, ArithmeticError, Index, PeerUnits, PoolUnits, Underlying};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One account's position on one side of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub on_pool: PoolUnits,
    pub in_peer: PeerUnits,
}

impl Balance {
    pub fn zero() -> Self {
        Self {
            on_pool: PoolUnits::zero(),
            in_peer: PeerUnits::zero(),
        }
    }

    pub fn new(on_pool: PoolUnits, in_peer: PeerUnits) -> Self {
        Self { on_pool, in_peer }
    }

    pub fn is_zero(&self) -> bool {
        self.on_pool.is_zero() && self.in_peer.is_zero()
    }

    /// Total position in underlying at the given pair of indices.
    pub fn total_underlying(
        &self,
        pool_index: Index,
        peer_index: Index,
    ) -> Result<Underlying, ArithmeticError> {
        self.on_pool
            .to_underlying(pool_index)?
            .checked_add(self.in_peer.to_underlying(peer_index)?)
    }
}

/// Position store for one (market, side): balances plus the pool-resting and peer
/// queues over them.
#[derive(Debug, Clone)]
pub struct SideBook {
    balances: HashMap<AccountId, Balance>,
    pool_queue: OrderedQueue,
    peer_queue: OrderedQueue,
}

impl SideBook {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            balances: HashMap::new(),
            pool_queue: OrderedQueue::new(queue_capacity),
            peer_queue: OrderedQueue::new(queue_capacity),
        }
    }

    /// Balance lookup. Accounts with no position read as zero; the entry itself is
    /// created lazily on the first non-zero write.
    pub fn balance_of(&self, account: AccountId) -> Balance {
        self.balances.get(&account).copied().unwrap_or_else(Balance::zero)
    }

    /// Write a balance and re-seat the account in both queues. A fully unwound
    /// balance is destroyed and dequeued.
    pub fn set_balance(&mut self, account: AccountId, balance: Balance) {
        if balance.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
        self.pool_queue
            .insert_or_update(account, balance.on_pool.value());
        self.peer_queue
            .insert_or_update(account, balance.in_peer.value());
    }

    pub fn pool_queue(&self) -> &OrderedQueue {
        &self.pool_queue
    }

    pub fn peer_queue(&self) -> &OrderedQueue {
        &self.peer_queue
    }

    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Balance)> {
        self.balances.iter()
    }

    /// Sum of all peer units on this side. O(accounts); the ledger check uses it, the
    /// hot path never does.
    pub fn total_peer_units(&self) -> Result<PeerUnits, ArithmeticError> {
        let mut total = PeerUnits::zero();
        for balance in self.balances.values() {
            total = total.checked_add(balance.in_peer)?;
        }
        Ok(total)
    }
}
