use crate::domain::ids::OrderId;
use crate::domain::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    /// Price after slippage.
    pub price: f64,
    /// Price at which the order triggered, before slippage.
    pub reference_price: f64,
    pub quantity: u64,
    pub commission: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }
}
