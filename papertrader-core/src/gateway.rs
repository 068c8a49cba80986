//! Execution gateway: the live path's boundary to a brokerage.
//!
//! The simulator never calls this. A live runner converts strategy intents
//! with [`LiveOrder::from_intent`] and sends them through an
//! [`ExecutionGateway`]. [`PaperGateway`] is an in-memory implementation.

use crate::domain::{IntentKind, OrderIntent, OrderSide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("limit price required for a limit order")]
    MissingLimitPrice,

    #[error("order quantity must be positive")]
    InvalidQuantity,

    #[error("unknown order '{0}'")]
    UnknownOrder(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveOrderType {
    Market,
    Limit { limit_price: f64 },
}

/// An order as sent to a brokerage. Bracket levels ride along with the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub order_type: LiveOrderType,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

impl LiveOrder {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: u64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: LiveOrderType::Market,
            take_profit: None,
            stop_loss: None,
        }
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u64,
        limit_price: Option<f64>,
    ) -> Result<Self, GatewayError> {
        let limit_price = limit_price.ok_or(GatewayError::MissingLimitPrice)?;
        Ok(Self {
            order_type: LiveOrderType::Limit { limit_price },
            ..Self::market(symbol, side, quantity)
        })
    }

    /// Translate a strategy intent into a gateway order for `symbol`.
    pub fn from_intent(symbol: impl Into<String>, intent: &OrderIntent) -> Result<Self, GatewayError> {
        if intent.quantity == 0 {
            return Err(GatewayError::InvalidQuantity);
        }
        let order = Self::market(symbol, intent.side, intent.quantity);
        Ok(match intent.kind {
            IntentKind::BracketEntry => Self {
                take_profit: intent.limit_price,
                stop_loss: intent.stop_price,
                ..order
            },
            IntentKind::CloseAtMarket => order,
        })
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.quantity == 0 {
            return Err(GatewayError::InvalidQuantity);
        }
        if let LiveOrderType::Limit { limit_price } = self.order_type {
            if !(limit_price.is_finite() && limit_price > 0.0) {
                return Err(GatewayError::MissingLimitPrice);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Accepted,
    Filled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: String,
    pub symbol: String,
    pub status: AckStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePosition {
    pub symbol: String,
    pub quantity: u64,
    pub avg_entry_price: f64,
}

/// Brokerage operations the live path needs.
pub trait ExecutionGateway: Send + Sync {
    fn name(&self) -> &str;

    fn submit_live_order(&self, order: &LiveOrder) -> Result<OrderAck, GatewayError>;

    fn cancel_order(&self, order_id: &str) -> Result<(), GatewayError>;

    fn get_positions(&self) -> Result<Vec<LivePosition>, GatewayError>;
}

#[derive(Debug, Default)]
struct PaperState {
    next_id: u64,
    marks: BTreeMap<String, f64>,
    open_orders: BTreeMap<String, LiveOrder>,
    positions: BTreeMap<String, LivePosition>,
}

/// In-memory gateway. Market orders fill at the last mark set for the
/// symbol; without a mark, and for limit orders, they rest until canceled.
#[derive(Debug, Default)]
pub struct PaperGateway {
    state: Mutex<PaperState>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mark(&self, symbol: impl Into<String>, price: f64) -> Result<(), GatewayError> {
        self.lock()?.marks.insert(symbol.into(), price);
        Ok(())
    }

    pub fn open_orders(&self) -> Result<Vec<(String, LiveOrder)>, GatewayError> {
        Ok(self
            .lock()?
            .open_orders
            .iter()
            .map(|(id, o)| (id.clone(), o.clone()))
            .collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, PaperState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Unavailable("paper gateway state poisoned".into()))
    }
}

impl PaperState {
    fn fill(&mut self, order: &LiveOrder, price: f64) -> Result<(), GatewayError> {
        let held = self
            .positions
            .get(&order.symbol)
            .map(|p| (p.quantity, p.avg_entry_price))
            .unwrap_or((0, 0.0));
        let position = match order.side {
            OrderSide::Buy => {
                let quantity = held.0 + order.quantity;
                LivePosition {
                    symbol: order.symbol.clone(),
                    quantity,
                    avg_entry_price: (held.0 as f64 * held.1 + order.quantity as f64 * price)
                        / quantity as f64,
                }
            }
            OrderSide::Sell => {
                if order.quantity > held.0 {
                    return Err(GatewayError::Rejected(format!(
                        "cannot sell {} {}: holding {}",
                        order.quantity, order.symbol, held.0
                    )));
                }
                LivePosition {
                    symbol: order.symbol.clone(),
                    quantity: held.0 - order.quantity,
                    avg_entry_price: held.1,
                }
            }
        };
        if position.quantity == 0 {
            self.positions.remove(&order.symbol);
        } else {
            self.positions.insert(order.symbol.clone(), position);
        }
        Ok(())
    }
}

impl ExecutionGateway for PaperGateway {
    fn name(&self) -> &str {
        "paper"
    }

    fn submit_live_order(&self, order: &LiveOrder) -> Result<OrderAck, GatewayError> {
        order.validate()?;
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = format!("paper-{}", state.next_id);

        let mark = state.marks.get(&order.symbol).copied();
        let status = match (order.order_type, mark) {
            (LiveOrderType::Market, Some(price)) => {
                state.fill(order, price)?;
                AckStatus::Filled
            }
            _ => {
                state.open_orders.insert(id.clone(), order.clone());
                AckStatus::Accepted
            }
        };
        info!(gateway = "paper", order = %id, symbol = %order.symbol, ?status, "live order submitted");
        Ok(OrderAck {
            id,
            symbol: order.symbol.clone(),
            status,
        })
    }

    fn cancel_order(&self, order_id: &str) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        if state.open_orders.remove(order_id).is_none() {
            return Err(GatewayError::UnknownOrder(order_id.to_string()));
        }
        debug!(order = order_id, "live order canceled");
        Ok(())
    }

    fn get_positions(&self) -> Result<Vec<LivePosition>, GatewayError> {
        Ok(self.lock()?.positions.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_intent_maps_levels() {
        let intent = OrderIntent::bracket_entry(10, 95.0, 110.0);
        let order = LiveOrder::from_intent("SPY", &intent).unwrap();
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.order_type, LiveOrderType::Market);
        assert_eq!(order.stop_loss, Some(95.0));
        assert_eq!(order.take_profit, Some(110.0));
    }

    #[test]
    fn close_intent_is_plain_market_sell() {
        let order = LiveOrder::from_intent("SPY", &OrderIntent::close_at_market(5)).unwrap();
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.stop_loss, None);
    }

    #[test]
    fn zero_quantity_intent_rejected() {
        let intent = OrderIntent::close_at_market(0);
        assert_eq!(
            LiveOrder::from_intent("SPY", &intent),
            Err(GatewayError::InvalidQuantity)
        );
    }

    #[test]
    fn limit_requires_price() {
        assert_eq!(
            LiveOrder::limit("SPY", OrderSide::Buy, 1, None),
            Err(GatewayError::MissingLimitPrice)
        );
    }

    #[test]
    fn paper_market_orders_fill_at_mark() {
        let gw = PaperGateway::new();
        gw.set_mark("SPY", 100.0).unwrap();
        let ack = gw
            .submit_live_order(&LiveOrder::market("SPY", OrderSide::Buy, 10))
            .unwrap();
        assert_eq!(ack.status, AckStatus::Filled);
        gw.set_mark("SPY", 110.0).unwrap();
        gw.submit_live_order(&LiveOrder::market("SPY", OrderSide::Buy, 10))
            .unwrap();

        let positions = gw.get_positions().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, 20);
        assert!((positions[0].avg_entry_price - 105.0).abs() < 1e-9);

        gw.submit_live_order(&LiveOrder::market("SPY", OrderSide::Sell, 20))
            .unwrap();
        assert!(gw.get_positions().unwrap().is_empty());
    }

    #[test]
    fn paper_oversell_rejected() {
        let gw = PaperGateway::new();
        gw.set_mark("SPY", 100.0).unwrap();
        assert!(matches!(
            gw.submit_live_order(&LiveOrder::market("SPY", OrderSide::Sell, 1)),
            Err(GatewayError::Rejected(_))
        ));
    }

    #[test]
    fn resting_orders_can_be_canceled() {
        let gw = PaperGateway::new();
        let order = LiveOrder::limit("SPY", OrderSide::Buy, 1, Some(90.0)).unwrap();
        let ack = gw.submit_live_order(&order).unwrap();
        assert_eq!(ack.status, AckStatus::Accepted);
        assert_eq!(gw.open_orders().unwrap().len(), 1);

        gw.cancel_order(&ack.id).unwrap();
        assert!(gw.open_orders().unwrap().is_empty());
        assert_eq!(
            gw.cancel_order(&ack.id),
            Err(GatewayError::UnknownOrder(ack.id.clone()))
        );
    }
}
