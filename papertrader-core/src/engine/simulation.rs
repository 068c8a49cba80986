//! Single-instrument bar loop.
//!
//! Two phases per bar:
//! 1. Broker: fill pending market orders, resolve brackets, mark equity.
//! 2. Strategy: consume the broker's events, emit at most one intent,
//!    which the broker accepts for the next bar.

use super::broker::{BrokerError, BrokerSimulator};
use super::cancel::CancelToken;
use super::cost_model::CostModel;
use super::path_policy::TieBreak;
use crate::domain::{Bar, EquityPoint, Fill, InputError, Order, OrderStatus, TradeRecord};
use crate::sizers::PercentRiskSizer;
use crate::strategy::{StrategyEngine, StrategyParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("broker error at bar {index}: {source}")]
    Broker {
        index: usize,
        #[source]
        source: BrokerError,
    },
}

/// Everything one instrument's simulation needs besides its bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_cash: f64,
    pub cost_model: CostModel,
    pub tie_break: TieBreak,
    pub risk_fraction: f64,
    pub min_size: u64,
    pub strategy: StrategyParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            cost_model: CostModel::default(),
            tie_break: TieBreak::default(),
            risk_fraction: 0.01,
            min_size: 1,
            strategy: StrategyParams::default(),
        }
    }
}

/// Result of simulating one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRun {
    pub symbol: String,
    pub initial_cash: f64,
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub fills: Vec<Fill>,
    pub orders: Vec<Order>,
    pub bars_processed: usize,
    pub bars_in_market: usize,
    /// False when the run stopped early on cancellation.
    pub completed: bool,
}

impl InstrumentRun {
    pub fn final_equity(&self) -> f64 {
        self.equity
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_cash)
    }

    pub fn rejected_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| matches!(o.status, OrderStatus::Rejected { .. }))
            .count()
    }

    /// Fraction of processed bars that closed with an open position.
    pub fn exposure(&self) -> f64 {
        if self.bars_processed == 0 {
            0.0
        } else {
            self.bars_in_market as f64 / self.bars_processed as f64
        }
    }
}

/// Run the strategy and broker over one instrument's bars.
///
/// `bars` must belong to a single symbol, in strictly increasing time order
/// (as produced by `BarSeries::by_symbol`).
pub fn run_instrument(
    bars: &[Bar],
    config: &SimulationConfig,
    cancel: &CancelToken,
) -> Result<InstrumentRun, SimulationError> {
    let first = bars.first().ok_or(InputError::EmptySeries)?;
    let symbol = first.symbol.clone();
    if !(config.initial_cash.is_finite() && config.initial_cash > 0.0) {
        return Err(InputError::InvalidParameter {
            name: "initial_cash",
            reason: format!("must be positive, got {}", config.initial_cash),
        }
        .into());
    }

    let sizer = PercentRiskSizer::new(config.risk_fraction, config.min_size);
    let mut strategy = StrategyEngine::new(config.strategy.clone(), Box::new(sizer), bars)?;
    let mut broker = BrokerSimulator::new(
        symbol.clone(),
        config.initial_cash,
        config.cost_model,
        config.tie_break,
    );

    info!(symbol = %symbol, bars = bars.len(), cash = config.initial_cash, "simulation started");

    let mut completed = true;
    for (index, bar) in bars.iter().enumerate() {
        if cancel.is_canceled() {
            warn!(symbol = %symbol, index, "simulation canceled");
            completed = false;
            break;
        }

        let report = broker
            .process_bar(bar)
            .map_err(|source| SimulationError::Broker { index, source })?;
        strategy.on_order_events(&report.events);

        let Some(intent) =
            strategy.on_bar(index, bar, broker.cash(), broker.position().quantity)
        else {
            continue;
        };
        match broker.submit(intent) {
            Ok(id) => strategy.order_submitted(id),
            Err(e) => debug!(symbol = %symbol, index, error = %e, "intent refused"),
        }
    }

    let run = InstrumentRun {
        symbol,
        initial_cash: config.initial_cash,
        bars_processed: broker.bars_processed(),
        bars_in_market: broker.bars_in_market(),
        trades: broker.trades().to_vec(),
        fills: broker.fills().to_vec(),
        orders: broker.orders().to_vec(),
        equity: broker.into_equity_curve(),
        completed,
    };
    info!(
        symbol = %run.symbol,
        trades = run.trades.len(),
        rejected = run.rejected_count(),
        final_equity = run.final_equity(),
        completed = run.completed,
        "simulation finished"
    );
    Ok(run)
}
