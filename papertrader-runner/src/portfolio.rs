//! Portfolio aggregation: independent per-instrument runs, blended.
//!
//! Each symbol gets `total_cash / N` and its own strategy and broker. The
//! runs share nothing, so they execute on the rayon pool; collecting the
//! parallel iterator is the join point. Blending then happens on the
//! timestamps every instrument has in common.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use papertrader_core::domain::{Bar, EquityPoint, InputError};
use papertrader_core::engine::{run_instrument, CancelToken, InstrumentRun, SimulationConfig, SimulationError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::resample::resample_daily;

/// How instrument equity curves combine into the portfolio curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityBlend {
    /// Mean of each instrument's equity divided by its starting cash.
    /// The curve is relative (starts near 1.0).
    #[default]
    RelativeMean,
    /// Sum of instrument equity in account currency.
    NotionalSum,
}

/// One instrument's equity curve and the cash it started with.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentCurve {
    pub initial_cash: f64,
    pub points: Vec<EquityPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioRun {
    pub blend: EquityBlend,
    pub equity: Vec<EquityPoint>,
    /// Sorted by symbol.
    pub instruments: Vec<InstrumentRun>,
    /// The curves the blend was built from, one per instrument, same order.
    /// Daily-resampled when requested.
    pub curves: Vec<InstrumentCurve>,
}

impl PortfolioRun {
    pub fn completed(&self) -> bool {
        self.instruments.iter().all(|r| r.completed)
    }
}

/// Simulate every symbol with an equal share of `config.initial_cash` and
/// blend the results.
pub fn run_portfolio(
    by_symbol: &BTreeMap<String, Vec<Bar>>,
    config: &SimulationConfig,
    blend: EquityBlend,
    resample: bool,
    cancel: &CancelToken,
) -> Result<PortfolioRun, SimulationError> {
    if by_symbol.is_empty() {
        return Err(InputError::EmptySeries.into());
    }
    let per_instrument = SimulationConfig {
        initial_cash: config.initial_cash / by_symbol.len() as f64,
        ..config.clone()
    };
    info!(
        instruments = by_symbol.len(),
        cash_each = per_instrument.initial_cash,
        ?blend,
        "portfolio started"
    );

    let instruments: Vec<InstrumentRun> = by_symbol
        .par_iter()
        .map(|(_, bars)| run_instrument(bars, &per_instrument, cancel))
        .collect::<Result<Vec<_>, _>>()?;

    let curves: Vec<InstrumentCurve> = instruments
        .iter()
        .map(|run| InstrumentCurve {
            initial_cash: run.initial_cash,
            points: if resample {
                resample_daily(&run.equity)
            } else {
                run.equity.clone()
            },
        })
        .collect();
    let equity = blend_equity(&curves, blend);

    info!(points = equity.len(), "portfolio finished");
    Ok(PortfolioRun {
        blend,
        equity,
        instruments,
        curves,
    })
}

/// Combine curves on the timestamps present in all of them.
///
/// The result is strictly increasing and contains only common timestamps.
pub fn blend_equity(curves: &[InstrumentCurve], blend: EquityBlend) -> Vec<EquityPoint> {
    let Some((head, rest)) = curves.split_first() else {
        return Vec::new();
    };
    let lookups: Vec<HashMap<DateTime<Utc>, f64>> = rest
        .iter()
        .map(|c| c.points.iter().map(|p| (p.timestamp, p.equity)).collect())
        .collect();

    let mut out: Vec<EquityPoint> = Vec::with_capacity(head.points.len());
    for point in &head.points {
        if out.last().is_some_and(|last| last.timestamp >= point.timestamp) {
            continue;
        }
        let mut total = contribution(point.equity, head.initial_cash, blend);
        let mut common = true;
        for (curve, lookup) in rest.iter().zip(&lookups) {
            match lookup.get(&point.timestamp) {
                Some(&equity) => total += contribution(equity, curve.initial_cash, blend),
                None => {
                    common = false;
                    break;
                }
            }
        }
        if !common {
            continue;
        }
        let value = match blend {
            EquityBlend::RelativeMean => total / curves.len() as f64,
            EquityBlend::NotionalSum => total,
        };
        out.push(EquityPoint::new(point.timestamp, value));
    }
    out
}

fn contribution(equity: f64, initial_cash: f64, blend: EquityBlend) -> f64 {
    match blend {
        EquityBlend::RelativeMean => equity / initial_cash,
        EquityBlend::NotionalSum => equity,
    }
}
