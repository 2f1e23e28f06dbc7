// 7.2 engine/matching.rs: the greedy queue walks. match_side brings `amount` of new
// liquidity on `side` into the peer tier; unmatch_side unwinds `amount` of peer
// liquidity on `side` back toward the pool. both are bounded by a work budget counted
// in queue iterations and checked before any work, so a budget of zero walks nothing.
//
// match_side offers the amount to the delta ledger before touching the queue: an
// outstanding delta on the incoming side is capacity that can be matched for free,
// without moving any other account. the unmatch walk has no such step; its ledger
// interaction is the zero-floor delta growth the caller applies to the shortfall.
//
// all arithmetic is units-first: the head's bucket is reduced by exact units and the
// underlying equivalent is derived from those units, so a fully drained bucket lands
// on exactly zero instead of a rounding remainder.

use super::results::{EngineError, MatchOutcome};
use crate::market::MarketState;
use crate::position::Balance;
use crate::types::{Side, Underlying};

// promote pool-resting accounts of the opposite side into the peer tier.
pub(super) fn match_side(
    market: &mut MarketState,
    side: Side,
    amount: Underlying,
    budget: u32,
) -> Result<MatchOutcome, EngineError> {
    if amount.is_zero() {
        return Ok(MatchOutcome::empty());
    }

    // delta first: a deficit on the incoming side is satisfied before any queue walk
    let backing_index = market.indexes.delta_backing_index(side);
    let from_delta = market.delta.consume(side, amount, backing_index)?;
    let mut matched = from_delta;

    let walked = side.opposite();
    let pool_index = market.indexes.pool_index(walked);
    let peer_index = market.indexes.peer_index(walked);
    let mut budget_left = budget;

    loop {
        let remaining = amount.checked_sub(matched)?;
        if remaining.is_zero() || budget_left == 0 {
            break;
        }
        let Some(head) = market.side_book(walked).pool_queue().peek_max() else {
            break;
        };

        let balance = market.side_book(walked).balance_of(head.account);
        let remaining_units = remaining.to_pool_units(pool_index)?;
        let moved_units = balance.on_pool.min(remaining_units);
        // half-up rounding can overshoot `remaining` by one unit step; clamp so the
        // running total never exceeds the request
        let moved = moved_units.to_underlying(pool_index)?.min(remaining);
        if moved.is_zero() {
            break;
        }

        let peer_units = moved.to_peer_units(peer_index)?;
        let new_balance = Balance::new(
            balance.on_pool.checked_sub(moved_units)?,
            balance.in_peer.checked_add(peer_units)?,
        );
        market.side_book_mut(walked).set_balance(head.account, new_balance);
        market.delta.add_peer_amount(walked, peer_units)?;

        matched = matched.checked_add(moved)?;
        budget_left -= 1;
    }

    Ok(MatchOutcome {
        matched,
        from_delta,
        budget_consumed: budget - budget_left,
    })
}

// demote peer accounts of the opposite side back to their pool-resting bucket.
pub(super) fn unmatch_side(
    market: &mut MarketState,
    side: Side,
    amount: Underlying,
    budget: u32,
) -> Result<MatchOutcome, EngineError> {
    if amount.is_zero() {
        return Ok(MatchOutcome::empty());
    }

    let walked = side.opposite();
    let pool_index = market.indexes.pool_index(walked);
    let peer_index = market.indexes.peer_index(walked);
    let mut unmatched = Underlying::zero();
    let mut budget_left = budget;

    loop {
        let remaining = amount.checked_sub(unmatched)?;
        if remaining.is_zero() || budget_left == 0 {
            break;
        }
        let Some(head) = market.side_book(walked).peer_queue().peek_max() else {
            break;
        };

        let balance = market.side_book(walked).balance_of(head.account);
        let remaining_units = remaining.to_peer_units(peer_index)?;
        let moved_units = balance.in_peer.min(remaining_units);
        let moved = moved_units.to_underlying(peer_index)?.min(remaining);
        if moved.is_zero() {
            break;
        }

        let pool_units = moved.to_pool_units(pool_index)?;
        let new_balance = Balance::new(
            balance.on_pool.checked_add(pool_units)?,
            balance.in_peer.checked_sub(moved_units)?,
        );
        market.side_book_mut(walked).set_balance(head.account, new_balance);
        market.delta.sub_peer_amount(walked, moved_units);

        unmatched = unmatched.checked_add(moved)?;
        budget_left -= 1;
    }

    Ok(MatchOutcome {
        matched: unmatched,
        from_delta: Underlying::zero(),
        budget_consumed: budget - budget_left,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketConfig;
    use crate::position::Balance;
    use crate::types::{AccountId, PeerUnits, PoolUnits, Timestamp};
    use rust_decimal_macros::dec;

    fn amt(v: rust_decimal::Decimal) -> Underlying {
        Underlying::new(v).unwrap()
    }

    fn market_with_suppliers(balances: &[(u64, rust_decimal::Decimal)]) -> MarketState {
        let mut market = MarketState::new(MarketConfig::dai(), Timestamp::from_millis(0));
        for (id, on_pool) in balances {
            let units = PoolUnits::new(*on_pool).unwrap();
            market
                .supply_book
                .set_balance(AccountId(*id), Balance::new(units, PeerUnits::zero()));
        }
        market
    }

    #[test]
    fn zero_budget_walks_nothing() {
        let mut market = market_with_suppliers(&[(1, dec!(1000))]);

        let out = match_side(&mut market, Side::Borrow, amt(dec!(500)), 0).unwrap();
        assert!(out.matched.is_zero());
        assert_eq!(out.budget_consumed, 0);
        // the head is untouched
        assert_eq!(
            market.supply_book.balance_of(AccountId(1)).on_pool.value(),
            dec!(1000)
        );
    }

    #[test]
    fn empty_queue_returns_zero_immediately() {
        let mut market = MarketState::new(MarketConfig::dai(), Timestamp::from_millis(0));
        let out = match_side(&mut market, Side::Borrow, amt(dec!(500)), 10).unwrap();
        assert!(out.matched.is_zero());
        assert_eq!(out.budget_consumed, 0);
    }

    #[test]
    fn match_takes_largest_head_first() {
        let mut market = market_with_suppliers(&[(1, dec!(100)), (2, dec!(800)), (3, dec!(50))]);

        let out = match_side(&mut market, Side::Borrow, amt(dec!(500)), 1).unwrap();
        assert_eq!(out.matched.value(), dec!(500));
        assert_eq!(out.budget_consumed, 1);

        // only account 2, the largest, was touched
        let b2 = market.supply_book.balance_of(AccountId(2));
        assert_eq!(b2.on_pool.value(), dec!(300));
        assert_eq!(b2.in_peer.value(), dec!(500));
        assert!(market.supply_book.balance_of(AccountId(1)).in_peer.is_zero());
    }

    #[test]
    fn match_walks_until_amount_filled() {
        let mut market = market_with_suppliers(&[(1, dec!(300)), (2, dec!(300)), (3, dec!(300))]);

        let out = match_side(&mut market, Side::Borrow, amt(dec!(750)), 10).unwrap();
        assert_eq!(out.matched.value(), dec!(750));
        assert_eq!(out.budget_consumed, 3);
        assert_eq!(market.delta.peer_supply_amount.value(), dec!(750));
    }

    #[test]
    fn budget_exhaustion_is_partial_not_error() {
        let mut market =
            market_with_suppliers(&[(1, dec!(100)), (2, dec!(100)), (3, dec!(100)), (4, dec!(100))]);

        let out = match_side(&mut market, Side::Borrow, amt(dec!(400)), 2).unwrap();
        assert_eq!(out.matched.value(), dec!(200));
        assert_eq!(out.budget_consumed, 2);
    }

    #[test]
    fn delta_is_consumed_before_the_queue() {
        let mut market = market_with_suppliers(&[(1, dec!(1000))]);
        market
            .delta
            .grow(Side::Borrow, amt(dec!(300)), market.indexes.pool_supply_index)
            .unwrap();

        let out = match_side(&mut market, Side::Borrow, amt(dec!(300)), 10).unwrap();

        // fully satisfied by the delta: no budget spent, queue untouched
        assert_eq!(out.matched.value(), dec!(300));
        assert_eq!(out.from_delta.value(), dec!(300));
        assert_eq!(out.budget_consumed, 0);
        assert!(market.delta.borrow_delta.is_zero());
        assert_eq!(
            market.supply_book.balance_of(AccountId(1)).on_pool.value(),
            dec!(1000)
        );
    }

    #[test]
    fn unmatch_demotes_peer_heads() {
        let mut market = MarketState::new(MarketConfig::dai(), Timestamp::from_millis(0));
        market.borrow_book.set_balance(
            AccountId(7),
            Balance::new(PoolUnits::zero(), PeerUnits::new(dec!(600)).unwrap()),
        );
        market
            .delta
            .add_peer_amount(Side::Borrow, PeerUnits::new(dec!(600)).unwrap())
            .unwrap();

        let out = unmatch_side(&mut market, Side::Supply, amt(dec!(600)), 5).unwrap();
        assert_eq!(out.matched.value(), dec!(600));

        let b = market.borrow_book.balance_of(AccountId(7));
        assert!(b.in_peer.is_zero());
        assert_eq!(b.on_pool.value(), dec!(600));
        assert!(market.delta.peer_borrow_amount.is_zero());
    }

    #[test]
    fn unmatch_with_zero_budget_is_empty() {
        let mut market = MarketState::new(MarketConfig::dai(), Timestamp::from_millis(0));
        market.borrow_book.set_balance(
            AccountId(7),
            Balance::new(PoolUnits::zero(), PeerUnits::new(dec!(600)).unwrap()),
        );

        let out = unmatch_side(&mut market, Side::Supply, amt(dec!(600)), 0).unwrap();
        assert!(out.matched.is_zero());
        assert_eq!(out.budget_consumed, 0);
    }
}
