//! Account loss limits

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Per-account loss limits; the default disables both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossLimits {
    /// Maximum realized loss per UTC day, in account currency (0 = disabled)
    pub daily_loss_limit: Decimal,
    /// Maximum run of losing trades (0 = disabled)
    pub max_consecutive_losses: u32,
}

/// Reason for trading halt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Realized loss today reached the daily limit
    DailyLossLimitReached { lost: Decimal, limit: Decimal },
    /// Too many losing trades in a row
    ConsecutiveLossLimitReached { count: u32, limit: u32 },
}

/// A realized trade outcome
#[derive(Debug, Clone, Copy)]
pub struct ClosedTrade {
    pub closed_at: DateTime<Utc>,
    pub realized_pnl: Decimal,
}

/// Tracks realized outcomes and triggers halts
#[derive(Debug, Clone)]
pub struct LossMonitor {
    /// Realized P&L for the current UTC day
    pub daily_pnl: Decimal,
    /// Current run of losing trades
    pub consecutive_losses: u32,
}

impl LossMonitor {
    /// Create an empty monitor
    pub fn new() -> Self {
        Self {
            daily_pnl: dec!(0),
            consecutive_losses: 0,
        }
    }

    /// Build from closed trades as of `now`
    pub fn from_trades(trades: &[ClosedTrade], now: DateTime<Utc>) -> Self {
        let mut ordered: Vec<&ClosedTrade> = trades.iter().collect();
        ordered.sort_by_key(|t| t.closed_at);

        let mut monitor = Self::new();
        let today = now.date_naive();
        for trade in ordered {
            monitor.record(trade.realized_pnl, trade.closed_at.date_naive() == today);
        }
        monitor
    }

    /// Record one realized outcome
    pub fn record(&mut self, realized_pnl: Decimal, today: bool) {
        if today {
            self.daily_pnl += realized_pnl;
        }
        if realized_pnl < dec!(0) {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Check if trading should be halted
    pub fn should_halt(&self, limits: &LossLimits) -> Option<HaltReason> {
        let lost = -self.daily_pnl;
        if limits.daily_loss_limit > dec!(0) && lost >= limits.daily_loss_limit {
            return Some(HaltReason::DailyLossLimitReached {
                lost,
                limit: limits.daily_loss_limit,
            });
        }

        if limits.max_consecutive_losses > 0
            && self.consecutive_losses >= limits.max_consecutive_losses
        {
            return Some(HaltReason::ConsecutiveLossLimitReached {
                count: self.consecutive_losses,
                limit: limits.max_consecutive_losses,
            });
        }

        None
    }
}

impl Default for LossMonitor {
    fn default() -> Self {
        Self::new()
    }
}
