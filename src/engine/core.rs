// 7.1 engine/core.rs: main engine. holds all markets, the pool adapter, and the event
// log. every public operation runs against exactly one market under an exclusive
// borrow, so operations are serialized by construction.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::events::{Event, EventId, EventPayload, MarketCreatedEvent, MarketStatusChangedEvent};
use crate::market::{MarketConfig, MarketState, MarketStatus};
use crate::pool::{PoolAction, PoolAdapter};
use crate::types::{MarketId, Timestamp};
use std::collections::HashMap;

/** 7.1.1: main engine struct. all optimizer state lives here */
#[derive(Debug)]
pub struct Engine<P: PoolAdapter> {
    pub(super) config: EngineConfig,
    pub(super) markets: HashMap<MarketId, MarketState>,
    pub(super) pool: P,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

impl<P: PoolAdapter> Engine<P> {
    pub fn new(config: EngineConfig, pool: P) -> Self {
        Self {
            config,
            markets: HashMap::new(),
            pool,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
        self.pool.sync_time(timestamp);
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.set_time(Timestamp::from_millis(self.current_time.as_millis() + millis));
    }

    pub fn create_market(&mut self, config: MarketConfig) -> Result<MarketId, EngineError> {
        config.validate()?;
        let market_id = config.id;
        let name = config.name.clone();
        let state = MarketState::new(config, self.current_time);
        self.markets.insert(market_id, state);
        self.emit_event(EventPayload::MarketCreated(MarketCreatedEvent {
            market_id,
            name,
        }));
        Ok(market_id)
    }

    pub fn get_market(&self, market_id: MarketId) -> Option<&MarketState> {
        self.markets.get(&market_id)
    }

    pub fn pause_market(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        self.set_market_status(market_id, MarketStatus::Paused)
    }

    pub fn resume_market(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        self.set_market_status(market_id, MarketStatus::Active)
    }

    pub fn close_market(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        self.set_market_status(market_id, MarketStatus::Closed)
    }

    fn set_market_status(
        &mut self,
        market_id: MarketId,
        status: MarketStatus,
    ) -> Result<(), EngineError> {
        let market = self
            .markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;
        market.status = status;
        self.emit_event(EventPayload::MarketStatusChanged(MarketStatusChangedEvent {
            market_id,
            status,
        }));
        Ok(())
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut P {
        &mut self.pool
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // 7.1.2: all-or-nothing commit. the operation closure mutates a staged clone of
    // the market and queues its pool movements; both land only if every step
    // succeeded. on any error the staged state is dropped and nothing changes.
    pub(super) fn with_market<T>(
        &mut self,
        market_id: MarketId,
        op: impl FnOnce(&mut MarketState, Timestamp) -> Result<(T, Vec<PoolAction>), EngineError>,
    ) -> Result<T, EngineError> {
        let market = self
            .markets
            .get(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;

        let mut staged = market.clone();
        let (result, actions) = op(&mut staged, self.current_time)?;

        if cfg!(debug_assertions) {
            staged.check_ledger()?;
        }

        for action in actions {
            action.apply(&mut self.pool, market_id)?;
        }
        self.markets.insert(market_id, staged);
        Ok(result)
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
