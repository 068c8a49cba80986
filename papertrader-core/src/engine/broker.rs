//! Broker simulator: bar-driven order execution for one instrument.
//!
//! Per bar, in order:
//! 1. Pending market orders (entries and closes) fill at the open.
//! 2. Armed bracket legs are checked against the bar's range. At most one
//!    leg fills; its OCO sibling is canceled.
//! 3. The holding counter advances and equity is marked at the close.
//!
//! Bracket legs sit dormant until their entry fills and become eligible on
//! the following bar, so a position is never stopped out on its entry bar.

use crate::domain::{
    Bar, EquityPoint, ExitReason, Fill, IntentKind, OcoGroupId, Order, OrderId, OrderIntent,
    OrderRole, OrderSide, OrderStatus, OrderType, Position, TradeRecord,
};
use crate::engine::account::Account;
use crate::engine::cost_model::CostModel;
use crate::engine::path_policy::{resolve_bracket, BracketOutcome, TieBreak};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error("order quantity must be positive")]
    ZeroQuantity,

    #[error("bracket entry is missing its {0} level")]
    MissingLevel(&'static str),

    #[error("cannot open a bracket while {0}")]
    EntryBlocked(&'static str),

    #[error("no open position to close")]
    NoPosition,

    #[error("a close order is already pending")]
    ClosePending,

    #[error("bar for '{found}' fed to the '{expected}' broker")]
    SymbolMismatch { expected: String, found: String },
}

/// Lifecycle change reported back to the strategy after a bar is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Filled {
        order_id: OrderId,
        role: OrderRole,
        fill: Fill,
    },
    Canceled {
        order_id: OrderId,
        role: OrderRole,
        reason: String,
    },
    Rejected {
        order_id: OrderId,
        role: OrderRole,
        reason: String,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::Filled { order_id, .. }
            | OrderEvent::Canceled { order_id, .. }
            | OrderEvent::Rejected { order_id, .. } => *order_id,
        }
    }

    pub fn role(&self) -> OrderRole {
        match self {
            OrderEvent::Filled { role, .. }
            | OrderEvent::Canceled { role, .. }
            | OrderEvent::Rejected { role, .. } => *role,
        }
    }
}

/// Outcome of processing one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarReport {
    pub bar_index: usize,
    pub events: Vec<OrderEvent>,
    pub equity: f64,
}

#[derive(Debug, Clone)]
struct OpenTrade {
    entry_time: DateTime<Utc>,
    entry_price: f64,
    quantity: u64,
    entry_commission: f64,
}

/// Simulated broker for a single instrument.
#[derive(Debug, Clone)]
pub struct BrokerSimulator {
    symbol: String,
    account: Account,
    cost_model: CostModel,
    tie_break: TieBreak,
    orders: Vec<Order>,
    fills: Vec<Fill>,
    trades: Vec<TradeRecord>,
    open_trade: Option<OpenTrade>,
    next_order_id: u64,
    next_oco_id: u64,
    bars_processed: usize,
    bars_in_market: usize,
}

impl BrokerSimulator {
    pub fn new(
        symbol: impl Into<String>,
        initial_cash: f64,
        cost_model: CostModel,
        tie_break: TieBreak,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            account: Account::new(initial_cash),
            cost_model,
            tie_break,
            orders: Vec::new(),
            fills: Vec::new(),
            trades: Vec::new(),
            open_trade: None,
            next_order_id: 1,
            next_oco_id: 1,
            bars_processed: 0,
            bars_in_market: 0,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn cash(&self) -> f64 {
        self.account.cash()
    }

    pub fn position(&self) -> &Position {
        self.account.position()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.account.equity_curve()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn bars_processed(&self) -> usize {
        self.bars_processed
    }

    /// Bars that closed with an open position.
    pub fn bars_in_market(&self) -> usize {
        self.bars_in_market
    }

    pub fn rejected_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| matches!(o.status, OrderStatus::Rejected { .. }))
            .count()
    }

    /// A market order (entry or close) is waiting for the next open.
    pub fn has_pending_market_order(&self) -> bool {
        self.orders
            .iter()
            .any(|o| o.is_active() && matches!(o.order_type, OrderType::Market))
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_active())
    }

    // ─── Submission ──────────────────────────────────────────────────

    /// Accept a strategy intent. Orders take effect from the next processed bar.
    ///
    /// A bracket entry creates three orders: a market buy plus dormant
    /// stop-loss and take-profit sells sharing one OCO group. The entry id
    /// is returned.
    pub fn submit(&mut self, intent: OrderIntent) -> Result<OrderId, BrokerError> {
        match intent.kind {
            IntentKind::BracketEntry => self.submit_bracket(intent),
            IntentKind::CloseAtMarket => self.submit_close(),
        }
    }

    fn submit_bracket(&mut self, intent: OrderIntent) -> Result<OrderId, BrokerError> {
        if intent.quantity == 0 {
            return Err(BrokerError::ZeroQuantity);
        }
        let stop_price = intent.stop_price.ok_or(BrokerError::MissingLevel("stop"))?;
        let limit_price = intent.limit_price.ok_or(BrokerError::MissingLevel("target"))?;
        if !self.position().is_flat() {
            return Err(BrokerError::EntryBlocked("a position is open"));
        }
        if self.orders.iter().any(|o| o.is_active()) {
            return Err(BrokerError::EntryBlocked("orders are still working"));
        }

        let created_bar = self.bars_processed.saturating_sub(1);
        let entry_id = self.allocate_id();
        let oco = OcoGroupId(self.next_oco_id);
        self.next_oco_id += 1;

        self.orders.push(Order {
            id: entry_id,
            symbol: self.symbol.clone(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            role: OrderRole::Entry,
            quantity: intent.quantity,
            status: OrderStatus::Pending,
            created_bar,
            parent_id: None,
            oco_group_id: None,
            activated_bar: None,
        });
        for (role, order_type) in [
            (OrderRole::StopLoss, OrderType::StopMarket { stop_price }),
            (OrderRole::TakeProfit, OrderType::Limit { limit_price }),
        ] {
            let id = self.allocate_id();
            self.orders.push(Order {
                id,
                symbol: self.symbol.clone(),
                side: OrderSide::Sell,
                order_type,
                role,
                quantity: intent.quantity,
                status: OrderStatus::Pending,
                created_bar,
                parent_id: Some(entry_id),
                oco_group_id: Some(oco),
                activated_bar: None,
            });
        }

        debug!(
            symbol = %self.symbol,
            order = %entry_id,
            qty = intent.quantity,
            stop = stop_price,
            target = limit_price,
            "bracket submitted"
        );
        Ok(entry_id)
    }

    fn submit_close(&mut self) -> Result<OrderId, BrokerError> {
        let quantity = self.position().quantity;
        if quantity == 0 {
            return Err(BrokerError::NoPosition);
        }
        if self.has_pending_market_order() {
            return Err(BrokerError::ClosePending);
        }
        let id = self.allocate_id();
        self.orders.push(Order {
            id,
            symbol: self.symbol.clone(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            role: OrderRole::Close,
            quantity,
            status: OrderStatus::Pending,
            created_bar: self.bars_processed.saturating_sub(1),
            parent_id: None,
            oco_group_id: None,
            activated_bar: None,
        });
        debug!(symbol = %self.symbol, order = %id, qty = quantity, "close submitted");
        Ok(id)
    }

    fn allocate_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    // ─── Bar processing ──────────────────────────────────────────────

    pub fn process_bar(&mut self, bar: &Bar) -> Result<BarReport, BrokerError> {
        if bar.symbol != self.symbol {
            return Err(BrokerError::SymbolMismatch {
                expected: self.symbol.clone(),
                found: bar.symbol.clone(),
            });
        }
        let index = self.bars_processed;
        let mut events = Vec::new();

        self.fill_market_orders(index, bar, &mut events);
        self.resolve_brackets(index, bar, &mut events);

        self.account.tick_holding();
        if !self.position().is_flat() {
            self.bars_in_market += 1;
        }
        let equity = self.account.mark(bar.timestamp, bar.close);
        self.bars_processed += 1;

        Ok(BarReport {
            bar_index: index,
            events,
            equity,
        })
    }

    fn fill_market_orders(&mut self, index: usize, bar: &Bar, events: &mut Vec<OrderEvent>) {
        let pending: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| {
                o.is_active() && matches!(o.order_type, OrderType::Market) && o.is_eligible(index)
            })
            .map(|(i, _)| i)
            .collect();

        for slot in pending {
            match self.orders[slot].role {
                OrderRole::Entry => self.fill_entry(slot, index, bar, events),
                _ => self.fill_close(slot, index, bar, events),
            }
        }
    }

    fn fill_entry(&mut self, slot: usize, index: usize, bar: &Bar, events: &mut Vec<OrderEvent>) {
        let (id, quantity) = (self.orders[slot].id, self.orders[slot].quantity);
        let (slipped, slip_amount) = self
            .cost_model
            .apply_slippage(bar.open, OrderSide::Buy, quantity);
        let price = slipped.min(bar.high);
        let commission = self.cost_model.compute_commission(price, quantity);
        let notional = price * quantity as f64;

        if !self.account.can_afford(notional, commission) {
            let reason = format!(
                "insufficient cash: need {:.2}, have {:.2}",
                notional + commission,
                self.cash()
            );
            warn!(symbol = %self.symbol, order = %id, %reason, "entry rejected");
            self.orders[slot].status = OrderStatus::Rejected {
                reason: reason.clone(),
            };
            events.push(OrderEvent::Rejected {
                order_id: id,
                role: OrderRole::Entry,
                reason,
            });
            self.cancel_children(id, "parent entry rejected", events);
            return;
        }

        let fill = self.make_fill(id, index, bar, OrderSide::Buy, price, bar.open, quantity, commission);
        self.account.apply_fill(&fill, slip_amount);
        self.orders[slot].status = OrderStatus::Filled;
        for child in self.orders.iter_mut().filter(|o| o.parent_id == Some(id)) {
            child.activated_bar = Some(index);
        }
        self.open_trade = Some(OpenTrade {
            entry_time: bar.timestamp,
            entry_price: price,
            quantity,
            entry_commission: commission,
        });
        debug!(symbol = %self.symbol, order = %id, price, qty = quantity, "entry filled");
        self.fills.push(fill.clone());
        events.push(OrderEvent::Filled {
            order_id: id,
            role: OrderRole::Entry,
            fill,
        });
    }

    fn fill_close(&mut self, slot: usize, index: usize, bar: &Bar, events: &mut Vec<OrderEvent>) {
        let (id, role) = (self.orders[slot].id, self.orders[slot].role);
        let quantity = self.orders[slot].quantity.min(self.position().quantity);
        if quantity == 0 {
            self.cancel_slot(slot, "no position to close", events);
            return;
        }
        self.cancel_resting_legs("position closed at market", events);

        let (slipped, slip_amount) = self
            .cost_model
            .apply_slippage(bar.open, OrderSide::Sell, quantity);
        let price = slipped.max(bar.low);
        self.exit(slot, index, bar, price, bar.open, quantity, slip_amount, ExitReason::TimeStop, events);
        debug!(symbol = %self.symbol, order = %id, ?role, price, "close filled");
    }

    fn resolve_brackets(&mut self, index: usize, bar: &Bar, events: &mut Vec<OrderEvent>) {
        if self.position().is_flat() {
            return;
        }
        let stop = self.orders.iter().position(|o| {
            o.is_active() && o.role == OrderRole::StopLoss && o.is_eligible(index)
        });
        let target = self.orders.iter().position(|o| {
            o.is_active() && o.role == OrderRole::TakeProfit && o.is_eligible(index)
        });
        let (Some(stop_slot), Some(target_slot)) = (stop, target) else {
            return;
        };
        let OrderType::StopMarket { stop_price } = self.orders[stop_slot].order_type else {
            return;
        };
        let OrderType::Limit { limit_price } = self.orders[target_slot].order_type else {
            return;
        };
        let quantity = self.position().quantity;

        match resolve_bracket(stop_price, limit_price, bar.open, bar.high, bar.low, self.tie_break) {
            BracketOutcome::None => {}
            BracketOutcome::Stop => {
                // A gap below the stop fills at the open.
                let reference = stop_price.min(bar.open);
                let (slipped, slip_amount) =
                    self.cost_model
                        .apply_slippage(reference, OrderSide::Sell, quantity);
                let price = slipped.max(bar.low);
                self.exit(stop_slot, index, bar, price, reference, quantity, slip_amount, ExitReason::StopLoss, events);
                self.cancel_slot(target_slot, "oco sibling filled", events);
            }
            BracketOutcome::Target => {
                // A gap above the target fills at the open; never worse than the limit.
                let reference = limit_price.max(bar.open);
                let (slipped, slip_amount) =
                    self.cost_model
                        .apply_slippage(reference, OrderSide::Sell, quantity);
                let price = slipped.max(limit_price).min(bar.high);
                self.exit(target_slot, index, bar, price, reference, quantity, slip_amount, ExitReason::TakeProfit, events);
                self.cancel_slot(stop_slot, "oco sibling filled", events);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn exit(
        &mut self,
        slot: usize,
        index: usize,
        bar: &Bar,
        price: f64,
        reference_price: f64,
        quantity: u64,
        slip_amount: f64,
        reason: ExitReason,
        events: &mut Vec<OrderEvent>,
    ) {
        let id = self.orders[slot].id;
        let role = self.orders[slot].role;
        let commission = self.cost_model.compute_commission(price, quantity);
        let bars_held = self.position().bars_held;
        let fill = self.make_fill(id, index, bar, OrderSide::Sell, price, reference_price, quantity, commission);
        self.account.apply_fill(&fill, slip_amount);
        self.orders[slot].status = OrderStatus::Filled;

        if let Some(open) = self.open_trade.take() {
            let total_commission = open.entry_commission + commission;
            self.trades.push(TradeRecord {
                symbol: self.symbol.clone(),
                entry_time: open.entry_time,
                entry_price: open.entry_price,
                exit_time: bar.timestamp,
                exit_price: price,
                quantity: open.quantity,
                exit_reason: reason,
                commission: total_commission,
                net_pnl: (price - open.entry_price) * quantity as f64 - total_commission,
                bars_held,
            });
        }
        debug!(symbol = %self.symbol, order = %id, ?reason, price, qty = quantity, "exit filled");

        self.fills.push(fill.clone());
        events.push(OrderEvent::Filled {
            order_id: id,
            role,
            fill,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn make_fill(
        &self,
        order_id: OrderId,
        bar_index: usize,
        bar: &Bar,
        side: OrderSide,
        price: f64,
        reference_price: f64,
        quantity: u64,
        commission: f64,
    ) -> Fill {
        Fill {
            order_id,
            bar_index,
            timestamp: bar.timestamp,
            symbol: self.symbol.clone(),
            side,
            price,
            reference_price,
            quantity,
            commission,
        }
    }

    // ─── Cancellation ────────────────────────────────────────────────

    fn cancel_slot(&mut self, slot: usize, reason: &str, events: &mut Vec<OrderEvent>) {
        let order = &mut self.orders[slot];
        if !order.is_active() {
            return;
        }
        order.status = OrderStatus::Canceled {
            reason: reason.to_string(),
        };
        events.push(OrderEvent::Canceled {
            order_id: order.id,
            role: order.role,
            reason: reason.to_string(),
        });
    }

    fn cancel_children(&mut self, parent: OrderId, reason: &str, events: &mut Vec<OrderEvent>) {
        let slots: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.parent_id == Some(parent))
            .map(|(i, _)| i)
            .collect();
        for slot in slots {
            self.cancel_slot(slot, reason, events);
        }
    }

    fn cancel_resting_legs(&mut self, reason: &str, events: &mut Vec<OrderEvent>) {
        let slots: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_active() && o.parent_id.is_some())
            .map(|(i, _)| i)
            .collect();
        for slot in slots {
            self.cancel_slot(slot, reason, events);
        }
    }

    /// Consume the broker, returning its equity series.
    pub fn into_equity_curve(self) -> Vec<EquityPoint> {
        self.account.into_equity_curve()
    }
}
