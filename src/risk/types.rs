//! Risk management types

use super::HaltReason;
use crate::error::ErrorClass;
use crate::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Risk calculation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    /// Equity must be positive and within range
    #[error("Invalid equity: {0}")]
    InvalidEquity(Decimal),
    /// Risk fraction outside the configured bounds
    #[error("Risk percentage {value} outside [{min}, {max}]")]
    RiskOutOfBounds {
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },
    /// Prices non-positive, out of range or on the wrong side of entry
    #[error("Invalid prices: {0}")]
    InvalidPrices(String),
    /// Entry and stop are closer than the minimum tick
    #[error("Degenerate stop: per-unit risk {per_unit_risk} below minimum tick {min_tick}")]
    DegenerateStop {
        per_unit_risk: Decimal,
        min_tick: Decimal,
    },
    /// Size rounds to zero at the fixed scale
    #[error("Position too small: {0}")]
    PositionTooSmall(Decimal),
    /// Result does not fit the fixed-point range
    #[error("Numeric overflow computing {0}")]
    NumericOverflow(&'static str),
    /// Account halted by its loss limits
    #[error("Trading halted: {0:?}")]
    TradingHalted(HaltReason),
}

impl RiskError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

/// Output of a sizing calculation, with the exact inputs used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSize {
    pub side: Side,
    pub equity: Decimal,
    pub risk_pct: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    /// equity * risk_pct
    pub risk_amount: Decimal,
    /// |entry_price - stop_loss|
    pub per_unit_risk: Decimal,
    /// risk_amount / per_unit_risk, in units of the base asset
    pub position_size: Decimal,
}

impl PositionSize {
    /// Notional value at entry
    pub fn notional(&self) -> Decimal {
        crate::money::fixed(self.position_size * self.entry_price)
    }
}
