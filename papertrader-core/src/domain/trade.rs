//! Completed round-trip trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeStop,
}

/// A closed round trip: one entry fill, one exit fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub quantity: u64,
    pub exit_reason: ExitReason,
    /// Entry plus exit commission.
    pub commission: f64,
    /// Price pnl minus both commissions.
    pub net_pnl: f64,
    pub bars_held: u32,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    /// Net return on the entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.quantity as f64;
        if notional <= 0.0 {
            return 0.0;
        }
        self.net_pnl / notional
    }
}
