//! Market data module
//!
//! Snapshots of price, top of book and optional depth, served to the
//! decision cycle through the [`MarketFeed`] trait.

mod feed;

pub use feed::StaticFeed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated order book depth near the touch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookDepth {
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
    pub levels: u32,
}

/// Point-in-time market state for one symbol on one exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub exchange: String,
    pub timestamp: DateTime<Utc>,
    /// Last traded price
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume_24h: Decimal,
    pub change_24h: Decimal,
    pub depth: Option<OrderBookDepth>,
}

impl MarketSnapshot {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Age of the snapshot at `now`; negative if it is from the future
    pub fn staleness(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }

    /// Storage key shared by feeds and archives
    pub fn series_key(exchange: &str, symbol: &str) -> String {
        format!("{exchange}:{symbol}")
    }
}

/// Source of market snapshots
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Most recent snapshot for `symbol` on `exchange`
    async fn latest_snapshot(&self, symbol: &str, exchange: &str) -> anyhow::Result<MarketSnapshot>;
}
