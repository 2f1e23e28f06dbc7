// 7.3 engine/operations.rs: public entry points. every flow follows the same shape:
// read pool indices, stage the market, refresh indexes, match or unmatch under the
// caller's budget, route the remainder to the pool, commit, emit events.
//
// the refresh happens inside the staged operation before any balance is touched, so
// stale conversion rates are impossible by construction rather than by runtime check.

use super::core::Engine;
use super::matching;
use super::results::{
    BorrowResult, EngineError, MatchOutcome, RepayResult, SupplyResult, WithdrawResult,
};
use crate::events::{
    BorrowedEvent, DeltaConsumedEvent, DeltaGrownEvent, EventPayload, IndexesRefreshedEvent,
    RepaidEvent, SuppliedEvent, WithdrawnEvent,
};
use crate::index::{refresh_indexes, MarketIndexState};
use crate::market::{MarketError, MarketState};
use crate::pool::{PoolAction, PoolAdapter};
use crate::position::Balance;
use crate::queue::QueueNode;
use crate::types::{AccountId, Bucket, Index, MarketId, Side, Timestamp, Underlying};

fn accrue(
    market: &mut MarketState,
    pool_supply: Index,
    pool_borrow: Index,
    now: Timestamp,
) -> Result<(), EngineError> {
    market.indexes = refresh_indexes(
        &market.indexes,
        &market.delta,
        &market.config.index_params,
        pool_supply,
        pool_borrow,
        now,
    )?;
    Ok(())
}

impl<P: PoolAdapter> Engine<P> {
    fn pool_indices(&self, market_id: MarketId) -> Result<(Index, Index), EngineError> {
        Ok((
            self.pool.pool_supply_index(market_id)?,
            self.pool.pool_borrow_index(market_id)?,
        ))
    }

    /// Pull the pool's indices and accrue the market's four indices to now.
    pub fn refresh_indexes(
        &mut self,
        market_id: MarketId,
    ) -> Result<MarketIndexState, EngineError> {
        let (pool_supply, pool_borrow) = self.pool_indices(market_id)?;
        let indexes = self.with_market(market_id, |market, now| {
            accrue(market, pool_supply, pool_borrow, now)?;
            Ok((market.indexes, Vec::new()))
        })?;
        self.emit_event(EventPayload::IndexesRefreshed(IndexesRefreshedEvent {
            market_id,
            pool_supply_index: indexes.pool_supply_index,
            pool_borrow_index: indexes.pool_borrow_index,
            peer_supply_index: indexes.peer_supply_index,
            peer_borrow_index: indexes.peer_borrow_index,
        }));
        Ok(indexes)
    }

    // 7.3.1: supply. match against borrow-side demand first (an outstanding supply
    // delta counts as demand), deposit the rest into the pool.
    pub fn supply(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        amount: Underlying,
        budget: u32,
    ) -> Result<SupplyResult, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::AmountIsZero);
        }
        let (pool_supply, pool_borrow) = self.pool_indices(market_id)?;

        let (out, pooled) = self.with_market(market_id, |market, now| {
            if !market.is_active() {
                return Err(MarketError::MarketNotActive(market_id).into());
            }
            accrue(market, pool_supply, pool_borrow, now)?;

            let out = matching::match_side(market, Side::Supply, amount, budget)?;
            let pooled = amount.checked_sub(out.matched)?;

            let mut balance = market.supply_book.balance_of(account);
            if !out.matched.is_zero() {
                let peer_units = out.matched.to_peer_units(market.indexes.peer_supply_index)?;
                balance.in_peer = balance.in_peer.checked_add(peer_units)?;
                market.delta.add_peer_amount(Side::Supply, peer_units)?;
            }
            if !pooled.is_zero() {
                let pool_units = pooled.to_pool_units(market.indexes.pool_supply_index)?;
                balance.on_pool = balance.on_pool.checked_add(pool_units)?;
            }
            market.supply_book.set_balance(account, balance);

            // matched funds repay borrow-side pool debt (promoted borrowers' or the
            // optimizer's own delta backing); the rest rests in the pool
            let actions = vec![PoolAction::Repay(out.matched), PoolAction::Deposit(pooled)];
            Ok(((out, pooled), actions))
        })?;

        if !out.from_delta.is_zero() {
            self.emit_event(EventPayload::DeltaConsumed(DeltaConsumedEvent {
                market_id,
                side: Side::Supply,
                amount: out.from_delta,
            }));
        }
        self.emit_event(EventPayload::Supplied(SuppliedEvent {
            market_id,
            account_id: account,
            amount,
            matched: out.matched,
            pooled,
            budget_consumed: out.budget_consumed,
        }));

        Ok(SupplyResult {
            amount,
            matched: out.matched,
            pooled,
            budget_consumed: out.budget_consumed,
        })
    }

    // 7.3.2: borrow. match against supply-side liquidity first (an outstanding borrow
    // delta counts as liquidity), borrow the rest from the pool.
    pub fn borrow(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        amount: Underlying,
        budget: u32,
    ) -> Result<BorrowResult, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::AmountIsZero);
        }
        let (pool_supply, pool_borrow) = self.pool_indices(market_id)?;

        let (out, pooled) = self.with_market(market_id, |market, now| {
            if !market.is_active() {
                return Err(MarketError::MarketNotActive(market_id).into());
            }
            accrue(market, pool_supply, pool_borrow, now)?;

            let out = matching::match_side(market, Side::Borrow, amount, budget)?;
            let pooled = amount.checked_sub(out.matched)?;

            let mut balance = market.borrow_book.balance_of(account);
            if !out.matched.is_zero() {
                let peer_units = out.matched.to_peer_units(market.indexes.peer_borrow_index)?;
                balance.in_peer = balance.in_peer.checked_add(peer_units)?;
                market.delta.add_peer_amount(Side::Borrow, peer_units)?;
            }
            if !pooled.is_zero() {
                let pool_units = pooled.to_pool_units(market.indexes.pool_borrow_index)?;
                balance.on_pool = balance.on_pool.checked_add(pool_units)?;
            }
            market.borrow_book.set_balance(account, balance);

            // matched funds leave the pool (promoted suppliers' deposits or the delta's
            // backing); the rest is a pool borrow
            let actions = vec![PoolAction::Withdraw(out.matched), PoolAction::Borrow(pooled)];
            Ok(((out, pooled), actions))
        })?;

        if !out.from_delta.is_zero() {
            self.emit_event(EventPayload::DeltaConsumed(DeltaConsumedEvent {
                market_id,
                side: Side::Borrow,
                amount: out.from_delta,
            }));
        }
        self.emit_event(EventPayload::Borrowed(BorrowedEvent {
            market_id,
            account_id: account,
            amount,
            matched: out.matched,
            pooled,
            budget_consumed: out.budget_consumed,
        }));

        Ok(BorrowResult {
            amount,
            matched: out.matched,
            pooled,
            budget_consumed: out.budget_consumed,
        })
    }

    // 7.3.3: withdraw. pool bucket first, then unwind the peer bucket: promote
    // replacement suppliers, demote matched borrowers, absorb what the budget could
    // not cover as supply delta. the withdrawer is paid in full either way.
    pub fn withdraw(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        amount: Underlying,
        budget: u32,
    ) -> Result<WithdrawResult, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::AmountIsZero);
        }
        let (pool_supply, pool_borrow) = self.pool_indices(market_id)?;

        let (result, replaced_delta) = self.with_market(market_id, |market, now| {
            if !market.accepts_exits() {
                return Err(MarketError::MarketClosed(market_id).into());
            }
            accrue(market, pool_supply, pool_borrow, now)?;

            let pool_index = market.indexes.pool_supply_index;
            let peer_index = market.indexes.peer_supply_index;
            let mut balance = market.supply_book.balance_of(account);

            // pool-resting bucket first; requests are capped at the position and
            // conversion dust is clamped so the running totals never overshoot
            let from_pool_units = balance.on_pool.min(amount.to_pool_units(pool_index)?);
            let from_pool = from_pool_units.to_underlying(pool_index)?.min(amount);
            balance.on_pool = balance.on_pool.checked_sub(from_pool_units)?;

            let remaining = amount.checked_sub(from_pool)?;
            let from_peer_units = balance.in_peer.min(remaining.to_peer_units(peer_index)?);
            let from_peer = from_peer_units.to_underlying(peer_index)?.min(remaining);
            balance.in_peer = balance.in_peer.checked_sub(from_peer_units)?;
            market.delta.sub_peer_amount(Side::Supply, from_peer_units);

            if from_pool.is_zero() && from_peer.is_zero() {
                return Err(EngineError::NothingToUnwind);
            }
            market.supply_book.set_balance(account, balance);

            // re-back the vacated claims: promotion first (this also consumes the
            // borrow delta if the withdrawer's own claims were pool-backed), then
            // demotion, then delta growth for whatever the budget left uncovered
            let promo = matching::match_side(market, Side::Borrow, from_peer, budget)?;
            let remaining_peer = from_peer.checked_sub(promo.matched)?;
            let demo = matching::unmatch_side(
                market,
                Side::Supply,
                remaining_peer,
                budget - promo.budget_consumed,
            )?;
            let shortfall = remaining_peer.checked_sub(demo.matched)?;
            market.delta.grow(
                Side::Supply,
                shortfall,
                market.indexes.delta_backing_index(Side::Supply),
            )?;

            let result = WithdrawResult {
                amount: from_pool.checked_add(from_peer)?,
                from_pool,
                from_peer,
                delta_grown: shortfall,
                budget_consumed: promo.budget_consumed + demo.budget_consumed,
            };
            let actions = vec![
                // the withdrawer's pool bucket plus replacement suppliers' deposits
                PoolAction::Withdraw(from_pool.checked_add(promo.matched)?),
                // demoted borrowers' new pool debt plus the delta's backing
                PoolAction::Borrow(demo.matched.checked_add(shortfall)?),
            ];
            Ok(((result, promo.from_delta), actions))
        })?;

        if !replaced_delta.is_zero() {
            self.emit_event(EventPayload::DeltaConsumed(DeltaConsumedEvent {
                market_id,
                side: Side::Borrow,
                amount: replaced_delta,
            }));
        }
        if !result.delta_grown.is_zero() {
            self.emit_event(EventPayload::DeltaGrown(DeltaGrownEvent {
                market_id,
                side: Side::Supply,
                amount: result.delta_grown,
            }));
        }
        self.emit_event(EventPayload::Withdrawn(WithdrawnEvent {
            market_id,
            account_id: account,
            amount: result.amount,
            from_pool: result.from_pool,
            from_peer: result.from_peer,
            budget_consumed: result.budget_consumed,
        }));

        Ok(result)
    }

    // 7.3.4: repay. pool debt first, then unwind the peer bucket: promote replacement
    // borrowers, demote matched suppliers, absorb the shortfall as borrow delta.
    pub fn repay(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        amount: Underlying,
        budget: u32,
    ) -> Result<RepayResult, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::AmountIsZero);
        }
        let (pool_supply, pool_borrow) = self.pool_indices(market_id)?;

        let (result, replaced_delta) = self.with_market(market_id, |market, now| {
            if !market.accepts_exits() {
                return Err(MarketError::MarketClosed(market_id).into());
            }
            accrue(market, pool_supply, pool_borrow, now)?;

            let pool_index = market.indexes.pool_borrow_index;
            let peer_index = market.indexes.peer_borrow_index;
            let mut balance = market.borrow_book.balance_of(account);

            let to_pool_units = balance.on_pool.min(amount.to_pool_units(pool_index)?);
            let to_pool = to_pool_units.to_underlying(pool_index)?.min(amount);
            balance.on_pool = balance.on_pool.checked_sub(to_pool_units)?;

            let remaining = amount.checked_sub(to_pool)?;
            let to_peer_units = balance.in_peer.min(remaining.to_peer_units(peer_index)?);
            let to_peer = to_peer_units.to_underlying(peer_index)?.min(remaining);
            balance.in_peer = balance.in_peer.checked_sub(to_peer_units)?;
            market.delta.sub_peer_amount(Side::Borrow, to_peer_units);

            if to_pool.is_zero() && to_peer.is_zero() {
                return Err(EngineError::NothingToUnwind);
            }
            market.borrow_book.set_balance(account, balance);

            let promo = matching::match_side(market, Side::Supply, to_peer, budget)?;
            let remaining_peer = to_peer.checked_sub(promo.matched)?;
            let demo = matching::unmatch_side(
                market,
                Side::Borrow,
                remaining_peer,
                budget - promo.budget_consumed,
            )?;
            let shortfall = remaining_peer.checked_sub(demo.matched)?;
            market.delta.grow(
                Side::Borrow,
                shortfall,
                market.indexes.delta_backing_index(Side::Borrow),
            )?;

            let result = RepayResult {
                amount: to_pool.checked_add(to_peer)?,
                to_pool,
                to_peer,
                delta_grown: shortfall,
                budget_consumed: promo.budget_consumed + demo.budget_consumed,
            };
            let actions = vec![
                // the repayer's own pool debt plus promoted borrowers' debt (and the
                // optimizer's delta backing) are repaid with the incoming funds
                PoolAction::Repay(to_pool.checked_add(promo.matched)?),
                // demoted suppliers' funds and the shortfall's backing re-enter the pool
                PoolAction::Deposit(demo.matched.checked_add(shortfall)?),
            ];
            Ok(((result, promo.from_delta), actions))
        })?;

        if !replaced_delta.is_zero() {
            self.emit_event(EventPayload::DeltaConsumed(DeltaConsumedEvent {
                market_id,
                side: Side::Supply,
                amount: replaced_delta,
            }));
        }
        if !result.delta_grown.is_zero() {
            self.emit_event(EventPayload::DeltaGrown(DeltaGrownEvent {
                market_id,
                side: Side::Borrow,
                amount: result.delta_grown,
            }));
        }
        self.emit_event(EventPayload::Repaid(RepaidEvent {
            market_id,
            account_id: account,
            amount: result.amount,
            to_pool: result.to_pool,
            to_peer: result.to_peer,
            budget_consumed: result.budget_consumed,
        }));

        Ok(result)
    }

    // 7.3.5: raw matching entry points for external orchestration. they refresh and
    // match but move no pool funds; routing any shortfall is the caller's job.
    pub fn match_side(
        &mut self,
        market_id: MarketId,
        side: Side,
        amount: Underlying,
        budget: u32,
    ) -> Result<MatchOutcome, EngineError> {
        let (pool_supply, pool_borrow) = self.pool_indices(market_id)?;
        self.with_market(market_id, |market, now| {
            accrue(market, pool_supply, pool_borrow, now)?;
            let out = matching::match_side(market, side, amount, budget)?;
            Ok((out, Vec::new()))
        })
    }

    pub fn unmatch_side(
        &mut self,
        market_id: MarketId,
        side: Side,
        amount: Underlying,
        budget: u32,
    ) -> Result<MatchOutcome, EngineError> {
        let (pool_supply, pool_borrow) = self.pool_indices(market_id)?;
        self.with_market(market_id, |market, now| {
            accrue(market, pool_supply, pool_borrow, now)?;
            let out = matching::unmatch_side(market, side, amount, budget)?;
            Ok((out, Vec::new()))
        })
    }

    // 7.3.6: read-only queue introspection for external tooling.
    pub fn get_head(&self, market_id: MarketId, side: Side, bucket: Bucket) -> Option<QueueNode> {
        let book = self.markets.get(&market_id)?.side_book(side);
        match bucket {
            Bucket::Pool => book.pool_queue().peek_max(),
            Bucket::Peer => book.peer_queue().peek_max(),
        }
    }

    pub fn get_next(
        &self,
        market_id: MarketId,
        side: Side,
        bucket: Bucket,
        account: AccountId,
    ) -> Option<QueueNode> {
        let book = self.markets.get(&market_id)?.side_book(side);
        match bucket {
            Bucket::Pool => book.pool_queue().next(account),
            Bucket::Peer => book.peer_queue().next(account),
        }
    }

    /// Raw balance buckets of an account on one side.
    pub fn position(
        &self,
        market_id: MarketId,
        side: Side,
        account: AccountId,
    ) -> Option<Balance> {
        Some(self.markets.get(&market_id)?.side_book(side).balance_of(account))
    }

    /// Supply position valued in underlying at the stored indices.
    pub fn supply_balance_of(
        &self,
        market_id: MarketId,
        account: AccountId,
    ) -> Result<Underlying, EngineError> {
        let market = self
            .markets
            .get(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;
        let balance = market.supply_book.balance_of(account);
        Ok(balance.total_underlying(
            market.indexes.pool_supply_index,
            market.indexes.peer_supply_index,
        )?)
    }

    /// Borrow position valued in underlying at the stored indices.
    pub fn borrow_balance_of(
        &self,
        market_id: MarketId,
        account: AccountId,
    ) -> Result<Underlying, EngineError> {
        let market = self
            .markets
            .get(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;
        let balance = market.borrow_book.balance_of(account);
        Ok(balance.total_underlying(
            market.indexes.pool_borrow_index,
            market.indexes.peer_borrow_index,
        )?)
    }
}
