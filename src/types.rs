//! Shared domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identifier
pub type AccountId = Uuid;

/// Position identifier
pub type PositionId = Uuid;

/// Risk calculation record identifier
pub type RecordId = Uuid;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Long: profits when price rises
    Buy,
    /// Short: profits when price falls
    Sell,
}

impl Side {
    /// +1 for BUY, -1 for SELL
    pub fn sign(&self) -> rust_decimal::Decimal {
        match self {
            Side::Buy => rust_decimal::Decimal::ONE,
            Side::Sell => rust_decimal::Decimal::NEGATIVE_ONE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(Side::Buy),
            "SELL" | "SHORT" => Ok(Side::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}
