//! Percent-of-cash sizer.
//!
//! ```text
//! quantity = max(min_size, floor(cash * risk_fraction / price))
//! ```
//!
//! Degenerate inputs (non-positive cash or price, NaN, infinities) fail
//! closed to `min_size`. The result is never zero.

use super::Sizer;

/// Whole-share quantity for a cash budget. Pure function.
///
/// A `min_size` of zero is treated as one.
pub fn percent_risk_size(cash: f64, risk_fraction: f64, price: f64, min_size: u64) -> u64 {
    let floor = min_size.max(1);
    if !(cash.is_finite() && risk_fraction.is_finite() && price.is_finite()) || price <= 0.0 {
        return floor;
    }
    let raw = (cash * risk_fraction / price).floor();
    if raw < floor as f64 {
        return floor;
    }
    // Saturating float-to-int cast caps absurd budgets at u64::MAX
    raw as u64
}

/// Risks a fixed fraction of available cash per trade.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentRiskSizer {
    risk_fraction: f64,
    min_size: u64,
}

impl PercentRiskSizer {
    pub fn new(risk_fraction: f64, min_size: u64) -> Self {
        Self {
            risk_fraction,
            min_size,
        }
    }

    pub fn risk_fraction(&self) -> f64 {
        self.risk_fraction
    }

    pub fn min_size(&self) -> u64 {
        self.min_size
    }
}

impl Sizer for PercentRiskSizer {
    fn size(&self, cash: f64, price: f64) -> u64 {
        percent_risk_size(cash, self.risk_fraction, price, self.min_size)
    }

    fn name(&self) -> &str {
        "PercentRisk"
    }
}
