use serde::{Deserialize, Serialize};

/// Position tracking for a single instrument (long only).
///
/// `quantity == 0` means flat. `bars_held` counts bars closed while holding,
/// starting at 1 on the bar of the entry fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: u64,
    pub avg_entry_price: f64,
    pub bars_held: u32,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity as f64 * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.quantity as f64 * (current_price - self.avg_entry_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_position_has_no_value() {
        let pos = Position::flat();
        assert!(pos.is_flat());
        assert_eq!(pos.market_value(123.0), 0.0);
    }

    #[test]
    fn unrealized_pnl_long() {
        let pos = Position {
            quantity: 10,
            avg_entry_price: 100.0,
            bars_held: 3,
        };
        assert!(!pos.is_flat());
        assert_eq!(pos.market_value(110.0), 1100.0);
        assert_eq!(pos.unrealized_pnl(110.0), 100.0);
    }
}
