//! Fixed-fractional (Van Tharp) position sizing
//!
//! ```text
//! risk_amount   = equity * risk_pct
//! per_unit_risk = |entry - stop|
//! position_size = risk_amount / per_unit_risk
//! ```
//!
//! Inputs are quantized to the fixed 8-digit scale before use and every
//! intermediate is rounded half-even, so identical inputs always produce
//! an identical result.

use super::{PositionSize, RiskError};
use crate::config::RiskConfig;
use crate::money;
use crate::types::Side;
use rust_decimal::Decimal;

/// Pure position size calculator under configured risk bounds
#[derive(Debug, Clone)]
pub struct RiskCalculator {
    config: RiskConfig,
}

impl RiskCalculator {
    /// Create a new calculator
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Check a risk fraction against the configured bounds
    pub fn check_risk_pct(&self, risk_pct: Decimal) -> Result<(), RiskError> {
        if risk_pct < self.config.min_risk_pct || risk_pct > self.config.max_risk_pct {
            return Err(RiskError::RiskOutOfBounds {
                value: risk_pct,
                min: self.config.min_risk_pct,
                max: self.config.max_risk_pct,
            });
        }
        Ok(())
    }

    /// Distance between entry and stop, guarded by the minimum tick
    pub fn per_unit_risk(&self, entry_price: Decimal, stop_loss: Decimal) -> Result<Decimal, RiskError> {
        let distance = money::fixed((entry_price - stop_loss).abs());
        if distance.is_zero() || distance < self.config.min_price_tick {
            return Err(RiskError::DegenerateStop {
                per_unit_risk: distance,
                min_tick: self.config.min_price_tick,
            });
        }
        Ok(distance)
    }

    /// Compute the position size for one trade
    pub fn compute(
        &self,
        equity: Decimal,
        risk_pct: Decimal,
        entry_price: Decimal,
        stop_loss: Decimal,
        side: Side,
    ) -> Result<PositionSize, RiskError> {
        let equity = money::fixed(equity);
        let risk_pct = money::fixed(risk_pct);
        let entry_price = money::fixed(entry_price);
        let stop_loss = money::fixed(stop_loss);

        if equity <= Decimal::ZERO || !money::in_range(equity) {
            return Err(RiskError::InvalidEquity(equity));
        }
        self.check_risk_pct(risk_pct)?;
        validate_price("entry price", entry_price)?;
        validate_price("stop loss", stop_loss)?;

        let per_unit_risk = self.per_unit_risk(entry_price, stop_loss)?;

        match side {
            Side::Buy if stop_loss >= entry_price => {
                return Err(RiskError::InvalidPrices(format!(
                    "BUY stop {stop_loss} must be below entry {entry_price}"
                )));
            }
            Side::Sell if stop_loss <= entry_price => {
                return Err(RiskError::InvalidPrices(format!(
                    "SELL stop {stop_loss} must be above entry {entry_price}"
                )));
            }
            _ => {}
        }

        let risk_amount = equity
            .checked_mul(risk_pct)
            .map(money::fixed)
            .ok_or(RiskError::NumericOverflow("risk amount"))?;

        let position_size = risk_amount
            .checked_div(per_unit_risk)
            .map(money::fixed)
            .filter(|size| money::in_range(*size))
            .ok_or(RiskError::NumericOverflow("position size"))?;

        if position_size.is_zero() {
            return Err(RiskError::PositionTooSmall(position_size));
        }

        Ok(PositionSize {
            side,
            equity,
            risk_pct,
            entry_price,
            stop_loss,
            risk_amount,
            per_unit_risk,
            position_size,
        })
    }
}

impl Default for RiskCalculator {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

fn validate_price(label: &str, price: Decimal) -> Result<(), RiskError> {
    if price <= Decimal::ZERO {
        return Err(RiskError::InvalidPrices(format!("{label} must be positive, got {price}")));
    }
    if !money::in_range(price) {
        return Err(RiskError::InvalidPrices(format!("{label} out of range: {price}")));
    }
    Ok(())
}
