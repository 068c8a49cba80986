//! Performance metrics: pure functions over an equity curve.
//!
//! Every metric is `Option<f64>`: `None` when it is undefined for the input
//! (too few points, zero variance, no drawdown) or the arithmetic produced a
//! non-finite value. Nothing here panics on degenerate curves.

use papertrader_core::domain::EquityPoint;
use serde::{Deserialize, Serialize};

const TRADING_DAYS: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Aggregate performance metrics for an equity curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub cagr: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    /// Negative fraction (-0.15 = 15% drawdown); 0.0 when equity never fell.
    pub max_drawdown: Option<f64>,
    pub calmar: Option<f64>,
    pub avg_daily_return: Option<f64>,
    pub vol_daily: Option<f64>,
}

impl MetricsResult {
    /// Compute every metric. Curves with fewer than two points give an
    /// all-`None` result.
    pub fn compute(curve: &[EquityPoint], risk_free_daily: f64) -> Self {
        if curve.len() < 2 {
            return Self::default();
        }
        let values: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        let returns = simple_returns(&values);
        let cagr = cagr(curve);
        let max_drawdown = max_drawdown(&returns);
        Self {
            cagr,
            sharpe: sharpe_ratio(&returns, risk_free_daily),
            sortino: sortino_ratio(&returns, risk_free_daily),
            max_drawdown,
            calmar: calmar_ratio(cagr, max_drawdown),
            avg_daily_return: mean_f64(&returns).and_then(finite),
            vol_daily: std_dev(&returns).and_then(finite),
        }
    }

    /// True when no metric is defined.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Compound annual growth rate over calendar time.
///
/// Years are `max(1, whole days between first and last point) / 365.25`.
pub fn cagr(curve: &[EquityPoint]) -> Option<f64> {
    let (first, last) = (curve.first()?, curve.last()?);
    if curve.len() < 2 || first.equity <= 0.0 || last.equity < 0.0 {
        return None;
    }
    let days = (last.timestamp - first.timestamp).num_days().max(1);
    let years = days as f64 / DAYS_PER_YEAR;
    finite((last.equity / first.equity).powf(1.0 / years) - 1.0)
}

/// Annualized Sharpe ratio: mean(excess) / sd(excess) * sqrt(252).
pub fn sharpe_ratio(returns: &[f64], risk_free_daily: f64) -> Option<f64> {
    let excess: Vec<f64> = returns.iter().map(|r| r - risk_free_daily).collect();
    let sd = std_dev(&excess)?;
    if !(sd > 0.0) {
        return None;
    }
    finite(mean_f64(&excess)? / sd * TRADING_DAYS.sqrt())
}

/// Annualized Sortino ratio: mean(excess) / sd(negative excess) * sqrt(252).
///
/// The downside deviation is the sample deviation of the negative excess
/// returns alone, so it needs at least two losing periods.
pub fn sortino_ratio(returns: &[f64], risk_free_daily: f64) -> Option<f64> {
    let excess: Vec<f64> = returns.iter().map(|r| r - risk_free_daily).collect();
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    let sd = std_dev(&downside)?;
    if !(sd > 0.0) {
        return None;
    }
    finite(mean_f64(&excess)? / sd * TRADING_DAYS.sqrt())
}

/// Deepest fall of the compounded return path below its running peak.
///
/// The path is `cumprod(1 + r)` starting from the first return, so a loss in
/// the very first period sets the initial peak rather than a drawdown.
pub fn max_drawdown(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mut cum = 1.0_f64;
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for r in returns {
        cum *= 1.0 + r;
        peak = peak.max(cum);
        let dd = cum / peak - 1.0;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    finite(max_dd)
}

/// CAGR / |max drawdown|; undefined without a drawdown.
pub fn calmar_ratio(cagr: Option<f64>, max_drawdown: Option<f64>) -> Option<f64> {
    let (c, dd) = (cagr?, max_drawdown?);
    if dd == 0.0 {
        return None;
    }
    finite(c / dd.abs())
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Period-over-period percentage change.
pub fn simple_returns(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (N-1 divisor).
pub(crate) fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean_f64(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
