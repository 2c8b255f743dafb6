//! Risk management module
//!
//! Position sizing under hard risk bounds, and account loss limits

mod calculator;
mod limits;
mod types;

pub use calculator::RiskCalculator;
pub use limits::{ClosedTrade, HaltReason, LossLimits, LossMonitor};
pub use types::{PositionSize, RiskError};
