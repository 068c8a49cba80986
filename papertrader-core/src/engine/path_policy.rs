//! Path policy: resolve bars where both bracket legs could trigger.
//!
//! OHLC bars do not say whether the high or the low traded first. When a
//! bar's range covers both the stop-loss and the take-profit, the tie-break
//! decides which leg fills; the other is canceled. An open already at or
//! through a level is known to have traded first and overrides the
//! tie-break.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Assume the adverse level traded first (conservative).
    #[default]
    StopFirst,
    /// Assume the favorable level traded first (optimistic).
    TargetFirst,
}

/// Which bracket leg fills on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketOutcome {
    None,
    Stop,
    Target,
}

/// Decide the bracket outcome for a long position given the bar's prices.
pub fn resolve_bracket(
    stop: f64,
    target: f64,
    open: f64,
    high: f64,
    low: f64,
    tie: TieBreak,
) -> BracketOutcome {
    if open <= stop {
        return BracketOutcome::Stop;
    }
    if open >= target {
        return BracketOutcome::Target;
    }
    let stop_hit = low <= stop;
    let target_hit = high >= target;
    match (stop_hit, target_hit) {
        (false, false) => BracketOutcome::None,
        (true, false) => BracketOutcome::Stop,
        (false, true) => BracketOutcome::Target,
        (true, true) => match tie {
            TieBreak::StopFirst => BracketOutcome::Stop,
            TieBreak::TargetFirst => BracketOutcome::Target,
        },
    }
}
