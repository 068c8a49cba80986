//! Cash, position, and the per-bar equity series for one instrument.

use crate::domain::{EquityPoint, Fill, OrderSide, Position};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Account {
    initial_cash: f64,
    cash: f64,
    position: Position,
    realized_pnl: f64,
    commission_paid: f64,
    slippage_paid: f64,
    equity: Vec<EquityPoint>,
}

impl Account {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            position: Position::flat(),
            realized_pnl: 0.0,
            commission_paid: 0.0,
            slippage_paid: 0.0,
            equity: Vec::new(),
        }
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    pub fn slippage_paid(&self) -> f64 {
        self.slippage_paid
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity
    }

    /// Whether the cash on hand covers a buy of `notional` plus `commission`.
    pub fn can_afford(&self, notional: f64, commission: f64) -> bool {
        notional + commission <= self.cash
    }

    /// Apply a fill to cash, position, and realized pnl.
    ///
    /// Buys open (or add to) the long position at the fill price; sells
    /// reduce it and realize pnl against the average entry.
    pub fn apply_fill(&mut self, fill: &Fill, slippage: f64) {
        let qty = fill.quantity as f64;
        match fill.side {
            OrderSide::Buy => {
                self.cash -= fill.price * qty;
                let held = self.position.quantity as f64;
                let total = held + qty;
                self.position.avg_entry_price =
                    (self.position.avg_entry_price * held + fill.price * qty) / total;
                if self.position.is_flat() {
                    self.position.bars_held = 0;
                }
                self.position.quantity += fill.quantity;
            }
            OrderSide::Sell => {
                let closed = fill.quantity.min(self.position.quantity);
                self.cash += fill.price * closed as f64;
                self.realized_pnl += (fill.price - self.position.avg_entry_price) * closed as f64;
                self.position.quantity -= closed;
                if self.position.is_flat() {
                    self.position = Position::flat();
                }
            }
        }
        self.cash -= fill.commission;
        self.commission_paid += fill.commission;
        self.slippage_paid += slippage;
    }

    /// Advance the holding counter for a bar that closed with an open position.
    pub fn tick_holding(&mut self) {
        if !self.position.is_flat() {
            self.position.bars_held += 1;
        }
    }

    /// Mark to market at the bar close and append the equity point.
    pub fn mark(&mut self, timestamp: DateTime<Utc>, close: f64) -> f64 {
        let equity = self.cash + self.position.market_value(close);
        self.equity.push(EquityPoint::new(timestamp, equity));
        equity
    }

    pub fn into_equity_curve(self) -> Vec<EquityPoint> {
        self.equity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderId;
    use chrono::TimeZone;

    fn fill(side: OrderSide, price: f64, quantity: u64, commission: f64) -> Fill {
        Fill {
            order_id: OrderId(1),
            bar_index: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            symbol: "SPY".into(),
            side,
            price,
            reference_price: price,
            quantity,
            commission,
        }
    }

    #[test]
    fn buy_then_sell_round_trip() {
        let mut acct = Account::new(10_000.0);
        acct.apply_fill(&fill(OrderSide::Buy, 100.0, 10, 1.0), 0.0);
        assert_eq!(acct.cash(), 10_000.0 - 1_000.0 - 1.0);
        assert_eq!(acct.position().quantity, 10);
        assert_eq!(acct.position().avg_entry_price, 100.0);

        acct.apply_fill(&fill(OrderSide::Sell, 110.0, 10, 1.1), 0.0);
        assert!((acct.cash() - (10_000.0 - 1.0 + 100.0 - 1.1)).abs() < 1e-9);
        assert!(acct.position().is_flat());
        assert!((acct.realized_pnl() - 100.0).abs() < 1e-9);
        assert!((acct.commission_paid() - 2.1).abs() < 1e-9);
    }

    #[test]
    fn mark_appends_equity() {
        let mut acct = Account::new(1_000.0);
        acct.apply_fill(&fill(OrderSide::Buy, 10.0, 5, 0.0), 0.0);
        let ts = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let eq = acct.mark(ts, 12.0);
        assert_eq!(eq, 950.0 + 60.0);
        assert_eq!(acct.equity_curve().len(), 1);
        assert_eq!(acct.equity_curve()[0].timestamp, ts);
    }

    #[test]
    fn affordability_includes_commission() {
        let acct = Account::new(1_000.0);
        assert!(acct.can_afford(999.0, 1.0));
        assert!(!acct.can_afford(999.0, 1.5));
    }

    #[test]
    fn holding_counter_only_ticks_when_long() {
        let mut acct = Account::new(1_000.0);
        acct.tick_holding();
        assert_eq!(acct.position().bars_held, 0);
        acct.apply_fill(&fill(OrderSide::Buy, 10.0, 1, 0.0), 0.0);
        acct.tick_holding();
        acct.tick_holding();
        assert_eq!(acct.position().bars_held, 2);
    }
}
