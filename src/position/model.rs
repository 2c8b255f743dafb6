//! Position entity and lifecycle states

use crate::money;
use crate::risk::PositionSize;
use crate::types::{AccountId, PositionId, RecordId, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Position lifecycle state
///
/// ```text
/// PENDING -> OPEN -> CLOSED
///    \-> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    /// Sized and recorded, not yet filled
    Pending,
    /// Entry confirmed by the exchange
    Open,
    /// Exited, P&L realized
    Closed,
    /// Abandoned before entry
    Cancelled,
}

impl PositionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PositionStatus::Closed | PositionStatus::Cancelled)
    }

    /// Whether the state machine allows `self -> next`
    pub fn can_transition_to(&self, next: PositionStatus) -> bool {
        matches!(
            (self, next),
            (PositionStatus::Pending, PositionStatus::Open)
                | (PositionStatus::Pending, PositionStatus::Cancelled)
                | (PositionStatus::Open, PositionStatus::Closed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Pending => "PENDING",
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
            PositionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form note attached after the fact; the only thing a terminal position accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub at: DateTime<Utc>,
    pub note: String,
}

/// A sized trade and its execution state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub account_id: AccountId,

    // Frozen at creation
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Option<Decimal>,
    pub account_equity_at_entry: Decimal,
    pub risk_percentage: Decimal,
    pub calculated_position_size: Decimal,
    /// Ledger record of the sizing calculation
    pub risk_calculation_id: Option<RecordId>,

    // Set by the exchange fill
    pub actual_position_size: Option<Decimal>,
    pub average_entry_price: Option<Decimal>,
    pub entry_order_ids: Vec<String>,
    pub status: PositionStatus,

    // Evolving
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub last_price_update: Option<DateTime<Utc>>,
    pub r_multiple: Option<Decimal>,
    pub exit_price: Option<Decimal>,

    pub annotations: Vec<Annotation>,

    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped on every write
    pub version: u64,
}

impl Position {
    /// Create a pending position frozen from a sizing result
    pub fn pending(
        account_id: AccountId,
        symbol: String,
        exchange: String,
        take_profit: Option<Decimal>,
        size: &PositionSize,
        risk_calculation_id: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            symbol,
            exchange,
            side: size.side,
            entry_price: size.entry_price,
            stop_loss: size.stop_loss,
            take_profit: take_profit.map(money::fixed),
            account_equity_at_entry: size.equity,
            risk_percentage: size.risk_pct,
            calculated_position_size: size.position_size,
            risk_calculation_id,
            actual_position_size: None,
            average_entry_price: None,
            entry_order_ids: vec![],
            status: PositionStatus::Pending,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: None,
            current_price: None,
            last_price_update: None,
            r_multiple: None,
            exit_price: None,
            annotations: vec![],
            created_at: now,
            opened_at: None,
            closed_at: None,
            updated_at: now,
            version: 0,
        }
    }

    /// Amount of equity put at risk; always recomputed from the frozen inputs
    pub fn risk_amount(&self) -> Decimal {
        money::fixed(self.account_equity_at_entry * self.risk_percentage)
    }

    /// Filled size, or the calculated size before entry
    pub fn effective_size(&self) -> Decimal {
        self.actual_position_size
            .unwrap_or(self.calculated_position_size)
    }

    /// Average fill price, or the planned entry before entry
    pub fn effective_entry_price(&self) -> Decimal {
        self.average_entry_price.unwrap_or(self.entry_price)
    }

    /// Whether the fields set at creation are identical in both versions
    pub fn same_frozen_inputs(&self, other: &Position) -> bool {
        self.id == other.id
            && self.account_id == other.account_id
            && self.symbol == other.symbol
            && self.exchange == other.exchange
            && self.side == other.side
            && self.entry_price == other.entry_price
            && self.stop_loss == other.stop_loss
            && self.take_profit == other.take_profit
            && self.account_equity_at_entry == other.account_equity_at_entry
            && self.risk_percentage == other.risk_percentage
            && self.calculated_position_size == other.calculated_position_size
            && self.risk_calculation_id == other.risk_calculation_id
            && self.created_at == other.created_at
    }

    /// Whether `other` differs from `self` only by annotations and bookkeeping
    pub fn differs_only_in_annotations(&self, other: &Position) -> bool {
        let mut normalized = other.clone();
        normalized.annotations = self.annotations.clone();
        normalized.updated_at = self.updated_at;
        normalized.version = self.version;
        normalized == *self
    }
}
