//! In-memory market feed

use super::{MarketFeed, MarketSnapshot};
use crate::storage::{InMemoryTimeSeries, TimeRange, TimeSeriesStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Feed backed by published snapshots; every snapshot is kept
pub struct StaticFeed {
    snapshots: Arc<dyn TimeSeriesStore<MarketSnapshot>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryTimeSeries::new()))
    }

    pub fn with_store(snapshots: Arc<dyn TimeSeriesStore<MarketSnapshot>>) -> Self {
        Self { snapshots }
    }

    /// Publish a snapshot
    pub fn publish(&self, snapshot: MarketSnapshot) -> anyhow::Result<()> {
        let key = MarketSnapshot::series_key(&snapshot.exchange, &snapshot.symbol);
        self.snapshots.append(&key, snapshot.timestamp, snapshot)?;
        Ok(())
    }

    pub fn history(&self, symbol: &str, exchange: &str, range: TimeRange) -> anyhow::Result<Vec<MarketSnapshot>> {
        Ok(self
            .snapshots
            .range_scan(&MarketSnapshot::series_key(exchange, symbol), range)?)
    }
}

impl Default for StaticFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketFeed for StaticFeed {
    async fn latest_snapshot(&self, symbol: &str, exchange: &str) -> anyhow::Result<MarketSnapshot> {
        self.snapshots
            .latest(&MarketSnapshot::series_key(exchange, symbol))?
            .ok_or_else(|| anyhow::anyhow!("No market data for {} on {}", symbol, exchange))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn snapshot(price: Decimal, age_secs: i64) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            exchange: "binance".to_string(),
            timestamp: Utc::now() - Duration::seconds(age_secs),
            price,
            bid: price - dec!(0.5),
            ask: price + dec!(0.5),
            volume_24h: dec!(100),
            change_24h: dec!(0),
            depth: None,
        }
    }

    #[tokio::test]
    async fn test_latest_is_newest_timestamp() {
        let feed = StaticFeed::new();
        feed.publish(snapshot(dec!(101), 1)).unwrap();
        feed.publish(snapshot(dec!(100), 10)).unwrap();

        let latest = feed.latest_snapshot("BTCUSDT", "binance").await.unwrap();
        assert_eq!(latest.price, dec!(101));
        assert_eq!(
            feed.history("BTCUSDT", "binance", TimeRange::all()).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_unknown_symbol() {
        let feed = StaticFeed::new();
        feed.publish(snapshot(dec!(100), 0)).unwrap();
        assert!(tokio_test::block_on(feed.latest_snapshot("DOGEUSDT", "binance")).is_err());
        assert!(tokio_test::block_on(feed.latest_snapshot("BTCUSDT", "kraken")).is_err());
    }
}
