// lendmatch-core: peer-to-peer lending pool optimizer engine.
// matching-first architecture: pair suppliers and borrowers directly, fall back to the
// underlying pool whenever no counterparty is available. all computation is
// deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, AccountId, Side, Underlying, units, Index
//   2.x  queue.rs: bounded-prefix ordered queue (heap prefix + arena overflow)
//   3.x  delta.rs: delta ledger: counterparty deficits and peer amount tracking
//   4.x  index.rs: pool/peer index model: growth factors, cursor blend, delta weight
//   5.x  pool.rs: external pool adapter trait + deterministic sim pool
//   6.x  events.rs: state transition events for audit
//   7.x  engine/: core engine: matching walks, supply/borrow/withdraw/repay
//        position.rs: balance buckets + per-side books with queue sync
//        market.rs: market config + runtime state

// core accounting modules
pub mod delta;
pub mod index;
pub mod position;
pub mod queue;
pub mod types;

// engine and surroundings
pub mod engine;
pub mod events;
pub mod market;
pub mod pool;

// re exports for convenience
pub use delta::*;
pub use engine::*;
pub use events::*;
pub use index::*;
pub use market::*;
pub use position::*;
pub use queue::*;
pub use types::*;
pub use pool::{PoolAction, PoolAdapter, PoolError, SimPool, SimPoolMarket};
