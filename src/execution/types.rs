//! Execution types

use crate::types::{PositionId, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Market order (immediate execution)
    Market,
    /// Limit order (price specified)
    Limit,
}

/// An order to be submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Position the order opens or closes
    pub position_id: PositionId,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    /// Reference price (limit price for limit orders)
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_type: OrderType,
}

/// Exchange acknowledgement with fill details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    /// Raw exchange response, kept for the audit trail
    pub response: String,
    pub fill_price: Decimal,
    pub filled_quantity: Decimal,
    pub fees: Decimal,
    pub timestamp: DateTime<Utc>,
}
