//! Derived performance metrics
//!
//! Pure functions of a position's stored fields and a price. Nothing here
//! touches storage.

use crate::money;
use crate::position::Position;
use crate::risk::{RiskCalculator, RiskError};
use rust_decimal::Decimal;

/// Computes P&L and R-multiples
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    calculator: RiskCalculator,
}

impl MetricsEngine {
    /// Share the calculator's minimum-tick guard
    pub fn new(calculator: RiskCalculator) -> Self {
        Self { calculator }
    }

    /// `(price - avg_entry) * size`, signed by side
    pub fn unrealized_pnl(&self, position: &Position, current_price: Decimal) -> Result<Decimal, RiskError> {
        signed_pnl(position, current_price)
    }

    /// Same formula at the exit price
    pub fn realized_pnl(&self, position: &Position, exit_price: Decimal) -> Result<Decimal, RiskError> {
        signed_pnl(position, exit_price)
    }

    /// Outcome in multiples of the initial per-unit risk
    ///
    /// Uses the planned entry and stop, not the fill, so the denominator is
    /// the risk that was sized for. Positive for a winning trade on either side.
    pub fn r_multiple(&self, position: &Position, exit_price: Decimal) -> Result<Decimal, RiskError> {
        let per_unit_risk = self
            .calculator
            .per_unit_risk(position.entry_price, position.stop_loss)?;
        let move_in_favor = position.side.sign() * (exit_price - position.entry_price);

        move_in_favor
            .checked_div(per_unit_risk)
            .map(money::fixed)
            .ok_or(RiskError::NumericOverflow("r-multiple"))
    }
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(RiskCalculator::default())
    }
}

fn signed_pnl(position: &Position, price: Decimal) -> Result<Decimal, RiskError> {
    let delta = position.side.sign() * (price - position.effective_entry_price());
    delta
        .checked_mul(position.effective_size())
        .map(money::fixed)
        .filter(|pnl| money::in_range(*pnl))
        .ok_or(RiskError::NumericOverflow("pnl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::types::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn position(side: Side, entry: Decimal, stop: Decimal) -> Position {
        let size = RiskCalculator::default()
            .compute(dec!(10000), dec!(0.02), entry, stop, side)
            .unwrap();
        Position::pending(
            Uuid::new_v4(),
            "BTCUSDT".to_string(),
            "binance".to_string(),
            None,
            &size,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_r_multiple_buy() {
        let engine = MetricsEngine::default();
        let p = position(Side::Buy, dec!(100), dec!(95));
        assert_eq!(engine.r_multiple(&p, dec!(110)).unwrap(), dec!(2.0000));
        assert_eq!(engine.r_multiple(&p, dec!(95)).unwrap(), dec!(-1));
    }

    #[test]
    fn test_r_multiple_sell() {
        let engine = MetricsEngine::default();
        let p = position(Side::Sell, dec!(100), dec!(105));
        assert_eq!(engine.r_multiple(&p, dec!(90)).unwrap(), dec!(2));
        assert_eq!(engine.r_multiple(&p, dec!(105)).unwrap(), dec!(-1));
    }

    #[test]
    fn test_r_multiple_degenerate_stop() {
        let engine = MetricsEngine::default();
        let mut p = position(Side::Buy, dec!(100), dec!(95));
        p.stop_loss = p.entry_price;
        assert!(matches!(
            engine.r_multiple(&p, dec!(110)),
            Err(RiskError::DegenerateStop { .. })
        ));
    }

    #[test]
    fn test_unrealized_uses_fill_when_present() {
        let engine = MetricsEngine::default();
        let mut p = position(Side::Buy, dec!(100), dec!(95));

        // Before fill: calculated size 40 at planned entry 100
        assert_eq!(engine.unrealized_pnl(&p, dec!(101)).unwrap(), dec!(40));

        p.actual_position_size = Some(dec!(39.5));
        p.average_entry_price = Some(dec!(100.2));
        // (101 - 100.2) * 39.5 = 31.6
        assert_eq!(engine.unrealized_pnl(&p, dec!(101)).unwrap(), dec!(31.6));
    }

    #[test]
    fn test_pnl_sell_side() {
        let engine = MetricsEngine::default();
        let mut p = position(Side::Sell, dec!(100), dec!(105));
        p.actual_position_size = Some(dec!(40));
        p.average_entry_price = Some(dec!(100));

        assert_eq!(engine.realized_pnl(&p, dec!(90)).unwrap(), dec!(400));
        assert_eq!(engine.realized_pnl(&p, dec!(105)).unwrap(), dec!(-200));
    }
}
