//! Position lifecycle operations
//!
//! Each mutation reads the row, builds the next version and writes it back
//! with a version check. A conflict rereads and retries a bounded number of
//! times, so writers on the same position serialize and writers on
//! different positions never wait on each other.

use super::{Annotation, Position, PositionError, PositionStatus};
use crate::account::AccountDirectory;
use crate::ledger::VerificationLedger;
use crate::money;
use crate::pnl::MetricsEngine;
use crate::risk::{ClosedTrade, LossMonitor, RiskCalculator, RiskError};
use crate::storage::{PositionRepository, StorageError};
use crate::telemetry;
use crate::types::{AccountId, PositionId, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;

/// Request to open a new position
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub account_id: AccountId,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Option<Decimal>,
    /// Overrides the account default; must not exceed the account maximum
    pub risk_percentage: Option<Decimal>,
}

/// Owns the position lifecycle
pub struct PositionStore {
    calculator: RiskCalculator,
    metrics: MetricsEngine,
    ledger: Arc<VerificationLedger>,
    accounts: Arc<dyn AccountDirectory>,
    repository: Arc<dyn PositionRepository>,
    max_write_retries: u32,
}

impl PositionStore {
    pub fn new(
        calculator: RiskCalculator,
        ledger: Arc<VerificationLedger>,
        accounts: Arc<dyn AccountDirectory>,
        repository: Arc<dyn PositionRepository>,
        max_write_retries: u32,
    ) -> Self {
        Self {
            metrics: MetricsEngine::new(calculator.clone()),
            calculator,
            ledger,
            accounts,
            repository,
            max_write_retries,
        }
    }

    /// Size, record and persist a new `PENDING` position
    pub fn create(&self, request: NewPosition) -> Result<Position, PositionError> {
        let settings = self.accounts.get_risk_settings(request.account_id)?;
        let equity = self.accounts.get_equity(request.account_id)?;

        let risk_pct = match request.risk_percentage {
            Some(pct) if pct > settings.max_risk_percentage() => {
                return Err(RiskError::RiskOutOfBounds {
                    value: pct,
                    min: self.calculator.config().min_risk_pct,
                    max: settings.max_risk_percentage(),
                }
                .into());
            }
            Some(pct) => pct,
            None => settings.default_risk_percentage(),
        };

        let now = Utc::now();
        let closed: Vec<ClosedTrade> = self
            .repository
            .list_by_account(request.account_id)?
            .into_iter()
            .filter_map(|p| match (p.status, p.closed_at, p.realized_pnl) {
                (PositionStatus::Closed, Some(closed_at), Some(realized_pnl)) => Some(ClosedTrade {
                    closed_at,
                    realized_pnl,
                }),
                _ => None,
            })
            .collect();
        if let Some(reason) = LossMonitor::from_trades(&closed, now).should_halt(&settings.limits) {
            tracing::warn!(account_id = %request.account_id, ?reason, "Position rejected by loss limits");
            return Err(RiskError::TradingHalted(reason).into());
        }

        validate_take_profit(request.side, request.entry_price, request.take_profit)?;

        let started = Instant::now();
        let size = self.calculator.compute(
            equity,
            risk_pct,
            request.entry_price,
            request.stop_loss,
            request.side,
        )?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let record = self.ledger.record(&size, elapsed_ms)?;
        let position = Position::pending(
            request.account_id,
            request.symbol,
            request.exchange,
            request.take_profit,
            &size,
            Some(record.id),
            now,
        );
        let position = self.repository.insert(position)?;

        telemetry::record_transition(None, PositionStatus::Pending);
        tracing::info!(
            position_id = %position.id,
            symbol = %position.symbol,
            side = %position.side,
            size = %position.calculated_position_size,
            risk_amount = %position.risk_amount(),
            "Position created"
        );
        Ok(position)
    }

    /// `PENDING -> OPEN` with the exchange fill
    pub fn confirm_entry(
        &self,
        position_id: PositionId,
        actual_size: Decimal,
        avg_entry_price: Decimal,
        order_ids: Vec<String>,
    ) -> Result<Position, PositionError> {
        if actual_size <= Decimal::ZERO || avg_entry_price <= Decimal::ZERO {
            return Err(RiskError::InvalidPrices(format!(
                "fill size {actual_size} and price {avg_entry_price} must be positive"
            ))
            .into());
        }

        self.mutate(position_id, "confirm_entry", |current| {
            require_transition(current, PositionStatus::Open, "confirm_entry")?;
            let now = Utc::now();
            let mut next = current.clone();
            next.status = PositionStatus::Open;
            next.actual_position_size = Some(money::fixed(actual_size));
            next.average_entry_price = Some(money::fixed(avg_entry_price));
            next.entry_order_ids = order_ids.clone();
            next.current_price = next.average_entry_price;
            next.opened_at = Some(now);
            next.updated_at = now;
            Ok(Some(next))
        })
        .inspect(|p| {
            telemetry::record_transition(Some(PositionStatus::Pending), PositionStatus::Open);
            tracing::info!(position_id = %p.id, size = %actual_size, price = %avg_entry_price, "Entry confirmed");
        })
    }

    /// Mark to market; stale timestamps are dropped
    pub fn update_price(
        &self,
        position_id: PositionId,
        current_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Position, PositionError> {
        require_positive_price(current_price)?;

        self.mutate(position_id, "update_price", |current| {
            if current.status != PositionStatus::Open {
                return Err(PositionError::InvalidTransition {
                    id: current.id,
                    from: current.status,
                    operation: "update_price",
                });
            }
            if current.last_price_update.is_some_and(|last| timestamp <= last) {
                tracing::warn!(
                    position_id = %current.id,
                    %timestamp,
                    "Dropping stale price update"
                );
                return Ok(None);
            }

            let mut next = current.clone();
            next.unrealized_pnl = self.metrics.unrealized_pnl(current, current_price)?;
            next.current_price = Some(money::fixed(current_price));
            next.last_price_update = Some(timestamp);
            next.updated_at = Utc::now();
            Ok(Some(next))
        })
    }

    /// `OPEN -> CLOSED`, realizing P&L and the R-multiple
    pub fn close(
        &self,
        position_id: PositionId,
        exit_price: Decimal,
        exit_timestamp: DateTime<Utc>,
    ) -> Result<Position, PositionError> {
        require_positive_price(exit_price)?;

        self.mutate(position_id, "close", |current| {
            require_transition(current, PositionStatus::Closed, "close")?;
            let realized = self.metrics.realized_pnl(current, exit_price)?;
            let r_multiple = self.metrics.r_multiple(current, exit_price)?;

            let mut next = current.clone();
            next.status = PositionStatus::Closed;
            next.realized_pnl = Some(realized);
            next.r_multiple = Some(r_multiple);
            next.unrealized_pnl = Decimal::ZERO;
            next.exit_price = Some(money::fixed(exit_price));
            next.current_price = next.exit_price;
            next.last_price_update = Some(exit_timestamp);
            next.closed_at = Some(exit_timestamp);
            next.updated_at = Utc::now();
            Ok(Some(next))
        })
        .inspect(|p| {
            telemetry::record_transition(Some(PositionStatus::Open), PositionStatus::Closed);
            tracing::info!(
                position_id = %p.id,
                realized_pnl = ?p.realized_pnl,
                r_multiple = ?p.r_multiple,
                "Position closed"
            );
        })
    }

    /// `PENDING -> CANCELLED`
    pub fn cancel(&self, position_id: PositionId) -> Result<Position, PositionError> {
        self.mutate(position_id, "cancel", |current| {
            require_transition(current, PositionStatus::Cancelled, "cancel")?;
            let mut next = current.clone();
            next.status = PositionStatus::Cancelled;
            next.updated_at = Utc::now();
            Ok(Some(next))
        })
        .inspect(|p| {
            telemetry::record_transition(Some(PositionStatus::Pending), PositionStatus::Cancelled);
            tracing::info!(position_id = %p.id, "Position cancelled");
        })
    }

    /// Attach a note; allowed in every state
    pub fn annotate(&self, position_id: PositionId, note: impl Into<String>) -> Result<Position, PositionError> {
        let note = note.into();
        self.mutate(position_id, "annotate", |current| {
            let now = Utc::now();
            let mut next = current.clone();
            next.annotations.push(Annotation {
                at: now,
                note: note.clone(),
            });
            next.updated_at = now;
            Ok(Some(next))
        })
    }

    pub fn get_position(&self, position_id: PositionId) -> Result<Position, PositionError> {
        self.repository
            .get(position_id)?
            .ok_or(PositionError::NotFound(position_id))
    }

    /// Positions of an account, oldest first, optionally filtered by status
    pub fn list_positions(
        &self,
        account_id: AccountId,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, PositionError> {
        Ok(self
            .repository
            .list_by_account(account_id)?
            .into_iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect())
    }

    pub fn metrics(&self) -> &MetricsEngine {
        &self.metrics
    }

    /// Read-modify-write with optimistic retries.
    ///
    /// `apply` returns `Ok(None)` for a no-op, which returns the current row.
    fn mutate<F>(&self, position_id: PositionId, operation: &'static str, apply: F) -> Result<Position, PositionError>
    where
        F: Fn(&Position) -> Result<Option<Position>, PositionError>,
    {
        let attempts = self.max_write_retries + 1;
        for attempt in 1..=attempts {
            let current = self.get_position(position_id)?;
            let Some(next) = apply(&current)? else {
                return Ok(current);
            };

            match self.repository.compare_and_swap(next, current.version) {
                Ok(saved) => return Ok(saved),
                Err(StorageError::VersionConflict { expected, actual, .. }) => {
                    tracing::warn!(
                        %position_id,
                        operation,
                        attempt,
                        expected,
                        actual,
                        "Write conflict, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        telemetry::record_conflict(operation);
        Err(PositionError::Conflict {
            id: position_id,
            attempts,
        })
    }
}

fn require_transition(
    current: &Position,
    next: PositionStatus,
    operation: &'static str,
) -> Result<(), PositionError> {
    if !current.status.can_transition_to(next) {
        return Err(PositionError::InvalidTransition {
            id: current.id,
            from: current.status,
            operation,
        });
    }
    Ok(())
}

fn require_positive_price(price: Decimal) -> Result<(), PositionError> {
    if price <= Decimal::ZERO || !money::in_range(price) {
        return Err(RiskError::InvalidPrices(format!("price must be positive, got {price}")).into());
    }
    Ok(())
}

fn validate_take_profit(side: Side, entry: Decimal, take_profit: Option<Decimal>) -> Result<(), RiskError> {
    let Some(target) = take_profit else {
        return Ok(());
    };
    // Compare the values that get frozen on the position
    let (entry, target) = (money::fixed(entry), money::fixed(target));
    if target <= Decimal::ZERO || !money::in_range(target) {
        return Err(RiskError::InvalidPrices(format!(
            "take profit must be positive and within range, got {target}"
        )));
    }
    let beyond_entry = match side {
        Side::Buy => target > entry,
        Side::Sell => target < entry,
    };
    if !beyond_entry {
        return Err(RiskError::InvalidPrices(format!(
            "{side} take profit {target} must be beyond entry {entry}"
        )));
    }
    Ok(())
}
