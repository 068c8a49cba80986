//! Orders, order lifecycle, and the intents a strategy hands to the broker.

use super::ids::{OcoGroupId, OrderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// What kind of order and its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill at the next processed bar's open.
    Market,
    /// Triggers when the bar trades through `stop_price`, then fills as market.
    StopMarket { stop_price: f64 },
    /// Fill at `limit_price` or better.
    Limit { limit_price: f64 },
}

/// The part an order plays in a bracket round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRole {
    Entry,
    StopLoss,
    TakeProfit,
    Close,
}

/// Order lifecycle states.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Canceled { reason: String },
    Rejected { reason: String },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// A single order held by the broker simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub role: OrderRole,
    pub quantity: u64,
    pub status: OrderStatus,
    pub created_bar: usize,
    /// Entry order for bracket legs.
    pub parent_id: Option<OrderId>,
    pub oco_group_id: Option<OcoGroupId>,
    /// Bar on which a bracket leg was armed by its entry fill. Legs are only
    /// eligible from the following bar.
    pub activated_bar: Option<usize>,
}

impl Order {
    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Bracket legs wait for their parent entry; everything else is live at once.
    pub fn is_armed(&self) -> bool {
        self.parent_id.is_none() || self.activated_bar.is_some()
    }

    pub fn is_eligible(&self, bar_index: usize) -> bool {
        match (self.parent_id, self.activated_bar) {
            (None, _) => true,
            (Some(_), Some(armed)) => bar_index > armed,
            (Some(_), None) => false,
        }
    }
}

/// The kind of instruction a strategy emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Market entry with attached OCO stop-loss and take-profit.
    BracketEntry,
    /// Flatten the position at market, canceling any resting bracket legs.
    CloseAtMarket,
}

/// A strategy's request to the broker. At most one per bar per instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub kind: IntentKind,
    pub side: OrderSide,
    pub quantity: u64,
    /// Take-profit level for bracket entries.
    pub limit_price: Option<f64>,
    /// Stop-loss level for bracket entries.
    pub stop_price: Option<f64>,
}

impl OrderIntent {
    pub fn bracket_entry(quantity: u64, stop_price: f64, target_price: f64) -> Self {
        Self {
            kind: IntentKind::BracketEntry,
            side: OrderSide::Buy,
            quantity,
            limit_price: Some(target_price),
            stop_price: Some(stop_price),
        }
    }

    pub fn close_at_market(quantity: u64) -> Self {
        Self {
            kind: IntentKind::CloseAtMarket,
            side: OrderSide::Sell,
            quantity,
            limit_price: None,
            stop_price: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(parent: Option<OrderId>, activated: Option<usize>) -> Order {
        Order {
            id: OrderId(2),
            symbol: "SPY".into(),
            side: OrderSide::Sell,
            order_type: OrderType::StopMarket { stop_price: 95.0 },
            role: OrderRole::StopLoss,
            quantity: 10,
            status: OrderStatus::Pending,
            created_bar: 0,
            parent_id: parent,
            oco_group_id: Some(OcoGroupId(1)),
            activated_bar: activated,
        }
    }

    #[test]
    fn bracket_leg_is_not_eligible_until_armed() {
        let order = leg(Some(OrderId(1)), None);
        assert!(!order.is_armed());
        assert!(!order.is_eligible(5));
    }

    #[test]
    fn armed_leg_waits_one_bar() {
        let order = leg(Some(OrderId(1)), Some(4));
        assert!(order.is_armed());
        assert!(!order.is_eligible(4));
        assert!(order.is_eligible(5));
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled {
            reason: "oco".into()
        }
        .is_terminal());
        assert!(OrderStatus::Rejected {
            reason: "cash".into()
        }
        .is_terminal());
    }

    #[test]
    fn bracket_intent_carries_levels() {
        let intent = OrderIntent::bracket_entry(10, 95.0, 110.0);
        assert_eq!(intent.kind, IntentKind::BracketEntry);
        assert_eq!(intent.side, OrderSide::Buy);
        assert_eq!(intent.stop_price, Some(95.0));
        assert_eq!(intent.limit_price, Some(110.0));
    }

    #[test]
    fn order_serialization_roundtrip() {
        let order = leg(Some(OrderId(1)), Some(3));
        let json = serde_json::to_string(&order).unwrap();
        let deser: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deser);
    }
}
