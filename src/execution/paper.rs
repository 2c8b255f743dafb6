//! Paper trading exchange

use super::{ExchangeClient, OrderAck, OrderRequest};
use crate::money;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Simulated exchange that fills every order in full at its price
pub struct PaperExchange {
    fee_rate: Decimal,
    fills: Arc<RwLock<Vec<OrderAck>>>,
}

impl PaperExchange {
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            fills: Arc::new(RwLock::new(vec![])),
        }
    }

    /// All fills so far, in submission order
    pub async fn get_fills(&self) -> Vec<OrderAck> {
        self.fills.read().await.clone()
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn submit_order(&self, order: OrderRequest) -> anyhow::Result<OrderAck> {
        if order.quantity <= Decimal::ZERO || order.price <= Decimal::ZERO {
            anyhow::bail!(
                "Rejected order: quantity {} and price {} must be positive",
                order.quantity,
                order.price
            );
        }

        let order_id = format!("paper-{}", Uuid::new_v4());
        let fees = money::fixed(order.quantity * order.price * self.fee_rate);
        let ack = OrderAck {
            response: format!(
                "FILLED {} {} {} @ {}",
                order.side, order.quantity, order.symbol, order.price
            ),
            order_id,
            fill_price: order.price,
            filled_quantity: order.quantity,
            fees,
            timestamp: Utc::now(),
        };

        self.fills.write().await.push(ack.clone());

        tracing::info!(
            order_id = %ack.order_id,
            position_id = %order.position_id,
            side = %order.side,
            quantity = %order.quantity,
            price = %order.price,
            "Paper order filled"
        );
        Ok(ack)
    }
}
