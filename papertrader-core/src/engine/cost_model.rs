//! Cost model: slippage and commission calculation.
//!
//! Slippage is directional and proportional to price: buyers pay more,
//! sellers receive less. Commission is a proportional rate on fill notional.

use crate::domain::OrderSide;
use serde::{Deserialize, Serialize};

/// Execution friction applied to every simulated fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Slippage in basis points, applied against the trade direction.
    pub slippage_bps: f64,
    /// Commission as a fraction of notional (0.001 = 10 bps).
    pub commission_rate: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            slippage_bps: 5.0,
            commission_rate: 0.0005,
        }
    }
}

impl CostModel {
    pub fn new(slippage_bps: f64, commission_rate: f64) -> Self {
        Self {
            slippage_bps,
            commission_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Apply slippage to a raw fill price.
    ///
    /// Returns `(slipped_price, slippage_dollar_amount)`.
    pub fn apply_slippage(&self, raw_price: f64, side: OrderSide, quantity: u64) -> (f64, f64) {
        if self.slippage_bps == 0.0 {
            return (raw_price, 0.0);
        }
        let slip_fraction = self.slippage_bps / 10_000.0;
        let slipped = match side {
            OrderSide::Buy => raw_price * (1.0 + slip_fraction),
            OrderSide::Sell => raw_price * (1.0 - slip_fraction),
        };
        (slipped, (slipped - raw_price).abs() * quantity as f64)
    }

    /// Commission for a fill: `price * quantity * commission_rate`.
    pub fn compute_commission(&self, fill_price: f64, quantity: u64) -> f64 {
        fill_price * quantity as f64 * self.commission_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_returns_raw_price() {
        let cost = CostModel::frictionless();
        let (price, slip) = cost.apply_slippage(100.0, OrderSide::Buy, 50);
        assert_eq!(price, 100.0);
        assert_eq!(slip, 0.0);
        assert_eq!(cost.compute_commission(100.0, 50), 0.0);
    }

    #[test]
    fn buy_slippage_increases_price() {
        let cost = CostModel::new(10.0, 0.0);
        let (price, slip) = cost.apply_slippage(100.0, OrderSide::Buy, 100);
        assert!((price - 100.10).abs() < 1e-10);
        assert!((slip - 10.0).abs() < 1e-9);
    }

    #[test]
    fn sell_slippage_decreases_price() {
        let cost = CostModel::new(10.0, 0.0);
        let (price, slip) = cost.apply_slippage(100.0, OrderSide::Sell, 100);
        assert!((price - 99.90).abs() < 1e-10);
        assert!((slip - 10.0).abs() < 1e-9);
    }

    #[test]
    fn commission_calculation() {
        let cost = CostModel::new(0.0, 0.001);
        // 100 * 1000 * 0.001 = 100
        assert!((cost.compute_commission(100.0, 1000) - 100.0).abs() < 1e-9);
    }
}
