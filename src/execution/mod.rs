//! Execution module
//!
//! Order submission to an exchange (paper or live)

mod paper;
mod types;

pub use paper::PaperExchange;
pub use types::{OrderAck, OrderRequest, OrderType};

use async_trait::async_trait;

/// Exchange order gateway
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Submit an order and wait for its fill
    async fn submit_order(&self, order: OrderRequest) -> anyhow::Result<OrderAck>;
}
