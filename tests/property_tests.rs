//! Property-based tests for the matching and accounting core.
//!
//! These tests verify the ledger invariants hold under random operation sequences.

use lendmatch_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn amt(v: Decimal) -> Underlying {
    Underlying::new(v).unwrap()
}

fn new_engine() -> Engine<SimPool> {
    let mut pool = SimPool::new(Timestamp::from_millis(0));
    pool.add_market(
        MarketId(1),
        SimPoolMarket {
            seed_liquidity: amt(dec!(100_000_000)),
            ..SimPoolMarket::default()
        },
    );
    let mut engine = Engine::new(EngineConfig::default(), pool);
    engine.create_market(MarketConfig::dai()).unwrap();
    engine
}

// Strategies for generating test data
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 10,000.00
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Supply(u64, Decimal, u32),
    Borrow(u64, Decimal, u32),
    Withdraw(u64, Decimal, u32),
    Repay(u64, Decimal, u32),
    Advance(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    (
        0u8..5,
        1u64..6,
        amount_strategy(),
        0u32..6,
        1i64..100_000i64,
    )
        .prop_map(|(kind, account, amount, budget, millis)| match kind {
            0 => Op::Supply(account, amount, budget),
            1 => Op::Borrow(account, amount, budget),
            2 => Op::Withdraw(account, amount, budget),
            3 => Op::Repay(account, amount, budget),
            _ => Op::Advance(millis),
        })
}

fn apply(engine: &mut Engine<SimPool>, op: Op) {
    match op {
        // empty-position withdrawals and repays are legitimate rejections; everything
        // else must not error under random inputs
        Op::Supply(a, v, b) => {
            engine.supply(AccountId(a), MarketId(1), amt(v), b).unwrap();
        }
        Op::Borrow(a, v, b) => {
            engine.borrow(AccountId(a), MarketId(1), amt(v), b).unwrap();
        }
        Op::Withdraw(a, v, b) => {
            let _ = engine.withdraw(AccountId(a), MarketId(1), amt(v), b);
        }
        Op::Repay(a, v, b) => {
            let _ = engine.repay(AccountId(a), MarketId(1), amt(v), b);
        }
        Op::Advance(ms) => {
            engine.advance_time(ms);
        }
    }
}

proptest! {
    /// Invariant: the tracked peer amount equals the sum of per-account peer units on
    /// both sides after every completed operation.
    #[test]
    fn ledger_consistent_after_random_operations(
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) {
        let mut engine = new_engine();

        for op in ops {
            apply(&mut engine, op);
            let market = engine.get_market(MarketId(1)).unwrap();
            prop_assert!(market.check_ledger().is_ok(), "ledger drifted after {:?}", op);
        }
    }

    /// Refreshing indexes never decreases any of the four indices.
    #[test]
    fn indices_never_decrease(
        steps in proptest::collection::vec(1i64..10_000_000i64, 1..20),
    ) {
        let mut engine = new_engine();
        engine.supply(AccountId(1), MarketId(1), amt(dec!(1000)), 5).unwrap();
        engine.borrow(AccountId(2), MarketId(1), amt(dec!(600)), 5).unwrap();

        let mut last = engine.get_market(MarketId(1)).unwrap().indexes;
        for step in steps {
            engine.advance_time(step);
            let now = engine.refresh_indexes(MarketId(1)).unwrap();

            prop_assert!(now.pool_supply_index >= last.pool_supply_index);
            prop_assert!(now.pool_borrow_index >= last.pool_borrow_index);
            prop_assert!(now.peer_supply_index >= last.peer_supply_index);
            prop_assert!(now.peer_borrow_index >= last.peer_borrow_index);
            last = now;
        }
    }

    /// Refreshing twice with no elapsed time and no pool change is the identity.
    #[test]
    fn refresh_is_idempotent(
        millis in 1i64..10_000_000i64,
    ) {
        let mut engine = new_engine();
        engine.supply(AccountId(1), MarketId(1), amt(dec!(1000)), 5).unwrap();
        engine.advance_time(millis);

        let once = engine.refresh_indexes(MarketId(1)).unwrap();
        let twice = engine.refresh_indexes(MarketId(1)).unwrap();

        prop_assert_eq!(once.pool_supply_index, twice.pool_supply_index);
        prop_assert_eq!(once.pool_borrow_index, twice.pool_borrow_index);
        prop_assert_eq!(once.peer_supply_index, twice.peer_supply_index);
        prop_assert_eq!(once.peer_borrow_index, twice.peer_borrow_index);
    }

    /// A zero work budget matches nothing and costs nothing.
    #[test]
    fn zero_budget_matches_nothing(
        supply in amount_strategy(),
        request in amount_strategy(),
    ) {
        let mut engine = new_engine();
        engine.supply(AccountId(1), MarketId(1), amt(supply), 0).unwrap();

        let out = engine
            .match_side(MarketId(1), Side::Borrow, amt(request), 0)
            .unwrap();
        prop_assert!(out.matched.is_zero());
        prop_assert_eq!(out.budget_consumed, 0);
    }

    /// The matcher never reports more than requested nor spends more than the budget.
    #[test]
    fn match_outcome_is_bounded(
        supply in amount_strategy(),
        request in amount_strategy(),
        budget in 0u32..8,
    ) {
        let mut engine = new_engine();
        engine.supply(AccountId(1), MarketId(1), amt(supply), 0).unwrap();

        let out = engine
            .match_side(MarketId(1), Side::Borrow, amt(request), budget)
            .unwrap();
        prop_assert!(out.matched <= amt(request));
        prop_assert!(out.budget_consumed <= budget);
    }

    /// Supplying and immediately withdrawing the same amount at the same instant
    /// returns the full amount and destroys the balance.
    #[test]
    fn same_instant_round_trip(
        amount in amount_strategy(),
    ) {
        let mut engine = new_engine();
        let alice = AccountId(1);

        engine.supply(alice, MarketId(1), amt(amount), 5).unwrap();
        let result = engine.withdraw(alice, MarketId(1), amt(amount), 5).unwrap();

        prop_assert_eq!(result.amount.value(), amount);
        let position = engine.position(MarketId(1), Side::Supply, alice).unwrap();
        prop_assert!(position.is_zero());
        prop_assert!(!engine
            .get_market(MarketId(1)).unwrap()
            .supply_book.pool_queue().contains(alice));
    }

    /// After an unmatch grows a delta, opposite-side activity of at least that size
    /// drives it back to zero before any queue walk happens.
    #[test]
    fn delta_is_consumed_first(
        matched in (100i64..100_000i64).prop_map(|x| Decimal::new(x, 2)),
        extra in (0i64..100_000i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let mut engine = new_engine();
        let alice = AccountId(1);
        let bob = AccountId(2);
        let carol = AccountId(3);

        engine.supply(alice, MarketId(1), amt(matched), 5).unwrap();
        engine.borrow(bob, MarketId(1), amt(matched), 5).unwrap();
        // zero-budget withdraw orphans bob's claim into a supply delta
        engine.withdraw(alice, MarketId(1), amt(matched), 0).unwrap();

        let delta_before = engine.get_market(MarketId(1)).unwrap().delta.supply_delta;
        prop_assert!(!delta_before.is_zero());

        // carol's supply covers the delta with budget to spare for the queue
        let result = engine
            .supply(carol, MarketId(1), amt(matched + extra), 5)
            .unwrap();

        let market = engine.get_market(MarketId(1)).unwrap();
        prop_assert!(market.delta.supply_delta.is_zero());
        prop_assert!(result.matched >= amt(matched));
    }

    /// Deltas never go negative no matter how much the consuming side over-asks.
    #[test]
    fn delta_never_negative(
        matched in (100i64..100_000i64).prop_map(|x| Decimal::new(x, 2)),
        oversize in (1i64..10i64).prop_map(Decimal::from),
    ) {
        let mut engine = new_engine();
        engine.supply(AccountId(1), MarketId(1), amt(matched), 5).unwrap();
        engine.borrow(AccountId(2), MarketId(1), amt(matched), 5).unwrap();
        engine.withdraw(AccountId(1), MarketId(1), amt(matched), 0).unwrap();

        // consume far more than the delta holds
        engine
            .supply(AccountId(3), MarketId(1), amt(matched * oversize), 5)
            .unwrap();

        let market = engine.get_market(MarketId(1)).unwrap();
        prop_assert!(market.delta.supply_delta.value() >= Decimal::ZERO);
        prop_assert!(market.check_ledger().is_ok());
    }
}
