//! OODA decision cycle
//!
//! OBSERVE and ORIENT run before a position exists, so their records are
//! held until DECIDE creates it and then written in order. A sizing refusal
//! at DECIDE leaves nothing to attach them to and only returns the error.

use super::RiskEngine;
use crate::audit::{
    DecisionOutcome, ExecutionPhaseRecord, ExecutionReport, MarketObservation, Phase, PhaseEntry, PhasePayload,
};
use crate::error::ErrorClass;
use crate::execution::{ExchangeClient, OrderAck, OrderRequest, OrderType};
use crate::market::{MarketFeed, MarketSnapshot};
use crate::position::{NewPosition, Position, PositionError, PositionStatus};
use crate::types::{AccountId, PositionId, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;

pub const STALE_MARKET_DATA: &str = "STALE_MARKET_DATA";
pub const CROSSED_BOOK: &str = "CROSSED_BOOK";

/// Entry request; the entry price comes from the observed market
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub account_id: AccountId,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub stop_loss: Decimal,
    pub take_profit: Option<Decimal>,
    pub risk_percentage: Option<Decimal>,
}

/// How a cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// Order filled and the position moved to its next state
    Executed { position: Position, ack: OrderAck },
    /// DECIDE failed on protocol violations; an entry position is cancelled
    Vetoed {
        position: Position,
        violations: Vec<String>,
    },
    /// Sizing or loss limits refused the trade; nothing was created
    Refused(PositionError),
    /// Exchange rejected the order
    ExecutionFailed { position: Position, reason: String },
}

impl CycleOutcome {
    pub fn position(&self) -> Option<&Position> {
        match self {
            CycleOutcome::Executed { position, .. }
            | CycleOutcome::Vetoed { position, .. }
            | CycleOutcome::ExecutionFailed { position, .. } => Some(position),
            CycleOutcome::Refused(_) => None,
        }
    }
}

/// Runs decision cycles against a feed and an exchange
pub struct DecisionCycle {
    engine: Arc<RiskEngine>,
    feed: Arc<dyn MarketFeed>,
    exchange: Arc<dyn ExchangeClient>,
}

struct PhaseTimer {
    start_time: DateTime<Utc>,
    started: Instant,
}

impl PhaseTimer {
    fn start() -> Self {
        Self {
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    fn finish(self, phase: Phase, success: bool, payload: PhasePayload) -> PhaseEntry {
        PhaseEntry {
            phase,
            start_time: self.start_time,
            duration_ms: self.started.elapsed().as_millis() as u64,
            success,
            payload,
        }
    }
}

impl DecisionCycle {
    pub fn new(engine: Arc<RiskEngine>, feed: Arc<dyn MarketFeed>, exchange: Arc<dyn ExchangeClient>) -> Self {
        Self {
            engine,
            feed,
            exchange,
        }
    }

    /// Open a position: observe, orient, size and record, then submit
    pub async fn run_entry(&self, request: TradeRequest) -> anyhow::Result<CycleOutcome> {
        let (snapshot, observe) = self.observe(&request.symbol, &request.exchange).await?;
        let (violations, orient) = self.orient(&snapshot);

        let timer = PhaseTimer::start();
        let created = self.engine.positions().create(NewPosition {
            account_id: request.account_id,
            symbol: request.symbol.clone(),
            exchange: request.exchange.clone(),
            side: request.side,
            entry_price: snapshot.price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            risk_percentage: request.risk_percentage,
        });
        let position = match created {
            Ok(position) => position,
            Err(e) if e.class() == ErrorClass::Validation => {
                tracing::warn!(symbol = %request.symbol, error = %e, "Entry refused by sizing");
                return Ok(CycleOutcome::Refused(e));
            }
            Err(e) => return Err(e.into()),
        };

        self.record(position.id, observe)?;
        self.record(position.id, orient)?;
        let decided = violations.is_empty();
        self.record(
            position.id,
            timer.finish(
                Phase::Decide,
                decided,
                PhasePayload::Decision(DecisionOutcome {
                    calculated_size: Some(position.calculated_position_size),
                    violations: violations.clone(),
                }),
            ),
        )?;

        if !decided {
            let position = self.engine.positions().cancel(position.id)?;
            tracing::warn!(position_id = %position.id, ?violations, "Entry vetoed");
            return Ok(CycleOutcome::Vetoed { position, violations });
        }

        let order = OrderRequest {
            position_id: position.id,
            symbol: position.symbol.clone(),
            exchange: position.exchange.clone(),
            side: position.side,
            price: position.entry_price,
            quantity: position.calculated_position_size,
            order_type: OrderType::Market,
        };
        match self.act(position.id, order).await? {
            Ok(ack) => {
                let position = self.engine.positions().confirm_entry(
                    position.id,
                    ack.filled_quantity,
                    ack.fill_price,
                    vec![ack.order_id.clone()],
                )?;
                Ok(CycleOutcome::Executed { position, ack })
            }
            Err(reason) => {
                let position = self.engine.positions().cancel(position.id)?;
                Ok(CycleOutcome::ExecutionFailed { position, reason })
            }
        }
    }

    /// Close an open position at the market
    pub async fn run_exit(&self, position_id: PositionId) -> anyhow::Result<CycleOutcome> {
        let position = self.engine.get_position(position_id)?;
        if position.status != PositionStatus::Open {
            return Err(PositionError::InvalidTransition {
                id: position.id,
                from: position.status,
                operation: "exit",
            }
            .into());
        }

        let (snapshot, observe) = self.observe(&position.symbol, &position.exchange).await?;
        self.record(position_id, observe)?;
        let position = self
            .engine
            .positions()
            .update_price(position_id, snapshot.price, snapshot.timestamp)?;

        let (violations, orient) = self.orient(&snapshot);
        self.record(position_id, orient)?;

        let timer = PhaseTimer::start();
        let decided = violations.is_empty();
        self.record(
            position_id,
            timer.finish(
                Phase::Decide,
                decided,
                PhasePayload::Decision(DecisionOutcome {
                    calculated_size: Some(position.effective_size()),
                    violations: violations.clone(),
                }),
            ),
        )?;
        if !decided {
            tracing::warn!(%position_id, ?violations, "Exit vetoed");
            return Ok(CycleOutcome::Vetoed { position, violations });
        }

        let order = OrderRequest {
            position_id,
            symbol: position.symbol.clone(),
            exchange: position.exchange.clone(),
            side: opposite(position.side),
            price: snapshot.price,
            quantity: position.effective_size(),
            order_type: OrderType::Market,
        };
        match self.act(position_id, order).await? {
            Ok(ack) => {
                let position = self
                    .engine
                    .positions()
                    .close(position_id, ack.fill_price, ack.timestamp)?;
                Ok(CycleOutcome::Executed { position, ack })
            }
            Err(reason) => Ok(CycleOutcome::ExecutionFailed { position, reason }),
        }
    }

    async fn observe(&self, symbol: &str, exchange: &str) -> anyhow::Result<(MarketSnapshot, PhaseEntry)> {
        let timer = PhaseTimer::start();
        let snapshot = self.feed.latest_snapshot(symbol, exchange).await?;
        let payload = PhasePayload::Market(observation(&snapshot, timer.start_time));
        Ok((snapshot, timer.finish(Phase::Observe, true, payload)))
    }

    /// Protocol checks on the observed market
    fn orient(&self, snapshot: &MarketSnapshot) -> (Vec<String>, PhaseEntry) {
        let timer = PhaseTimer::start();
        let max_age = chrono::Duration::seconds(self.engine.config().cycle.max_snapshot_age_secs as i64);

        let mut violations = vec![];
        if snapshot.staleness(timer.start_time) > max_age {
            violations.push(STALE_MARKET_DATA.to_string());
        }
        if snapshot.bid > snapshot.ask {
            violations.push(CROSSED_BOOK.to_string());
        }

        let payload = PhasePayload::Market(observation(snapshot, timer.start_time));
        (violations, timer.finish(Phase::Orient, true, payload))
    }

    /// Submit and record ACT; the inner error is the exchange rejection
    async fn act(&self, position_id: PositionId, order: OrderRequest) -> anyhow::Result<Result<OrderAck, String>> {
        let timer = PhaseTimer::start();
        let quantity = order.quantity;
        match self.exchange.submit_order(order).await {
            Ok(ack) => {
                self.record(
                    position_id,
                    timer.finish(
                        Phase::Act,
                        true,
                        PhasePayload::Execution(ExecutionReport {
                            exchange_order_id: Some(ack.order_id.clone()),
                            response: Some(ack.response.clone()),
                            fill_price: Some(ack.fill_price),
                            quantity: Some(ack.filled_quantity),
                        }),
                    ),
                )?;
                Ok(Ok(ack))
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(%position_id, error = %reason, "Order submission failed");
                self.record(
                    position_id,
                    timer.finish(
                        Phase::Act,
                        false,
                        PhasePayload::Execution(ExecutionReport {
                            exchange_order_id: None,
                            response: Some(reason.clone()),
                            fill_price: None,
                            quantity: Some(quantity),
                        }),
                    ),
                )?;
                Ok(Err(reason))
            }
        }
    }

    fn record(&self, position_id: PositionId, entry: PhaseEntry) -> anyhow::Result<ExecutionPhaseRecord> {
        Ok(self.engine.audit().append_phase(position_id, entry)?)
    }
}

fn observation(snapshot: &MarketSnapshot, now: DateTime<Utc>) -> MarketObservation {
    MarketObservation {
        price: snapshot.price,
        bid: snapshot.bid,
        ask: snapshot.ask,
        spread: snapshot.spread(),
        staleness_ms: snapshot.staleness(now).num_milliseconds(),
    }
}

fn opposite(side: Side) -> Side {
    match side {
        Side::Buy => Side::Sell,
        Side::Sell => Side::Buy,
    }
}
