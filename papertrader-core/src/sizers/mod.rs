//! Position Sizers: determine trade quantity
//!
//! Sizers translate a cash balance and a price into a whole-share quantity.
//! They never decide entry/exit and never choose order types.

pub mod percent_risk;

pub use percent_risk::{percent_risk_size, PercentRiskSizer};

/// Position sizing logic
///
/// Implementations are pure: the same inputs always produce the same
/// quantity, and the result is always at least one share.
pub trait Sizer: Send + Sync {
    /// Quantity to buy given the cash currently available and the reference price.
    fn size(&self, cash: f64, price: f64) -> u64;

    /// Sizer name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummySizer;

    impl Sizer for DummySizer {
        fn size(&self, _cash: f64, _price: f64) -> u64 {
            100
        }

        fn name(&self) -> &str {
            "dummy"
        }
    }

    #[test]
    fn sizer_trait_is_object_safe() {
        let sizer: Box<dyn Sizer> = Box::new(DummySizer);
        assert_eq!(sizer.size(10_000.0, 50.0), 100);
        assert_eq!(sizer.name(), "dummy");
    }
}
