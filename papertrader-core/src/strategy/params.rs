//! Strategy parameters and stop placement.

use crate::domain::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How protective stop and target levels are placed around the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StopMode {
    /// Multiples of ATR below/above the entry.
    #[default]
    Atr,
    /// Fixed fractions of the entry price.
    Percent,
}

impl FromStr for StopMode {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atr" => Ok(StopMode::Atr),
            "percent" | "pct" => Ok(StopMode::Percent),
            _ => Err(InputError::UnsupportedStopMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for StopMode {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StopMode> for String {
    fn from(mode: StopMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for StopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopMode::Atr => write!(f, "atr"),
            StopMode::Percent => write!(f, "percent"),
        }
    }
}

/// Parameters for the EMA crossover strategy with bracket exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub atr_period: usize,
    pub stop_mode: StopMode,
    /// ATR multiple for the stop-loss distance.
    pub atr_stop_mult: f64,
    /// ATR multiple for the take-profit distance.
    pub atr_target_mult: f64,
    pub stop_pct: f64,
    pub target_pct: f64,
    /// Force a market close after this many bars in position.
    pub max_bars_held: Option<u32>,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            atr_period: 14,
            stop_mode: StopMode::Atr,
            atr_stop_mult: 2.0,
            atr_target_mult: 3.0,
            stop_pct: 0.01,
            target_pct: 0.02,
            max_bars_held: None,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), InputError> {
        for (name, period) in [
            ("fast_period", self.fast_period),
            ("slow_period", self.slow_period),
            ("atr_period", self.atr_period),
        ] {
            if period == 0 {
                return Err(invalid(name, "must be >= 1"));
            }
        }
        if self.fast_period >= self.slow_period {
            return Err(invalid(
                "fast_period",
                format!(
                    "must be below slow_period ({} >= {})",
                    self.fast_period, self.slow_period
                ),
            ));
        }
        match self.stop_mode {
            StopMode::Atr => {
                positive("atr_stop_mult", self.atr_stop_mult)?;
                positive("atr_target_mult", self.atr_target_mult)?;
            }
            StopMode::Percent => {
                positive("stop_pct", self.stop_pct)?;
                positive("target_pct", self.target_pct)?;
                if self.stop_pct >= 1.0 {
                    return Err(invalid("stop_pct", "must be below 1.0"));
                }
            }
        }
        if self.max_bars_held == Some(0) {
            return Err(invalid("max_bars_held", "must be >= 1 when set"));
        }
        Ok(())
    }

    /// Stop-loss and take-profit levels for a long entry at `entry`.
    ///
    /// Returns `None` when the levels do not bracket the entry (e.g. zero ATR).
    pub fn bracket_levels(&self, entry: f64, atr: f64) -> Option<(f64, f64)> {
        let (stop, target) = match self.stop_mode {
            StopMode::Atr => (
                entry - self.atr_stop_mult * atr,
                entry + self.atr_target_mult * atr,
            ),
            StopMode::Percent => (entry * (1.0 - self.stop_pct), entry * (1.0 + self.target_pct)),
        };
        (stop.is_finite() && target.is_finite() && stop < entry && target > entry)
            .then_some((stop, target))
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> InputError {
    InputError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be positive, got {value}")))
    }
}
