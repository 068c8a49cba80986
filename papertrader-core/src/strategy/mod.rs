//! Strategy: turns indicator state into order intents.
//!
//! One `StrategyEngine` per instrument. It never touches cash or positions
//! directly; it only sees what the broker reports back.

pub mod ema_cross;
pub mod params;

pub use ema_cross::{StrategyEngine, StrategyState};
pub use params::{StopMode, StrategyParams};
