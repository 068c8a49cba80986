//! Backtest runner: wires data loading, portfolio simulation and metrics.
//!
//! Two entry points:
//! - `run_from_config()`: builds the configured provider, loads bars, runs. Used by the CLI.
//! - `run_backtest()`: takes an already validated `BarSeries`. Used by tests and callers
//!   that bring their own data.

use papertrader_core::data::{
    BarProvider, CsvProvider, ProviderError, RetryPolicy, RetryingProvider, SyntheticProvider,
};
use papertrader_core::domain::{BarSeries, EquityPoint, InputError, TradeRecord};
use papertrader_core::engine::{CancelToken, SimulationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{BacktestConfig, ConfigError, DataSource, RunId};
use crate::metrics::MetricsResult;
use crate::portfolio::{run_portfolio, EquityBlend};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("input error: {0}")]
    Input(#[from] InputError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Per-instrument slice of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub symbol: String,
    pub sharpe: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub trade_count: usize,
    pub rejected_count: usize,
    /// Fraction of bars that closed with an open position.
    pub exposure: f64,
    pub initial_cash: f64,
    pub final_equity: f64,
    pub bar_count: usize,
    pub completed: bool,
}

/// Complete result of a portfolio backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub blend: EquityBlend,
    /// Blended portfolio curve.
    pub equity: Vec<EquityPoint>,
    pub instruments: Vec<InstrumentSummary>,
    pub metrics: MetricsResult,
    /// Closed round trips across all instruments, by symbol then exit time.
    pub trades: Vec<TradeRecord>,
    pub completed: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Build the bar provider the config names, wrapped in retry.
pub fn build_provider(config: &BacktestConfig) -> Result<Box<dyn BarProvider>, ConfigError> {
    let policy = RetryPolicy {
        max_attempts: config.data.retry_attempts.max(1),
        ..RetryPolicy::default()
    };
    let provider: Box<dyn BarProvider> = match config.data.source {
        DataSource::Synthetic => Box::new(RetryingProvider::new(
            SyntheticProvider::new(config.data.seed),
            policy,
        )),
        DataSource::Csv => {
            let path = config.data.csv_path.clone().ok_or(ConfigError::Invalid {
                field: "data.csv_path",
                reason: "required when data.source = \"csv\"".into(),
            })?;
            Box::new(RetryingProvider::new(
                CsvProvider::new(path, config.backtest.timeframe),
                policy,
            ))
        }
    };
    Ok(provider)
}

/// Fetch the configured universe and apply the session filter.
///
/// Any provider failure, or a requested symbol with no bars, ends the run
/// as `InputError::NoData`.
pub fn load_series(provider: &dyn BarProvider, config: &BacktestConfig) -> Result<BarSeries, RunError> {
    let (start, end) = config.date_range();
    let symbols = &config.backtest.symbols;
    let timeframe = config.backtest.timeframe;

    let series = provider
        .fetch_bars(symbols, timeframe, start, end)
        .map_err(|e| match e {
            ProviderError::Invalid(input) => input,
            other => InputError::NoData(format!("{}: {other}", provider.name())),
        })?;

    let series = match config.data.session {
        Some(session) if timeframe.is_intraday() => session.apply(series)?,
        Some(_) => {
            debug!(%timeframe, "session filter skipped for daily bars");
            series
        }
        None => series,
    };

    let present = series.symbols();
    if let Some(missing) = symbols.iter().find(|s| !present.contains(*s)) {
        return Err(InputError::NoData(format!("no bars for '{missing}'")).into());
    }
    info!(provider = provider.name(), bars = series.len(), symbols = present.len(), "bars loaded");
    Ok(series)
}

/// Run the configured strategy over `series` and compute the report.
pub fn run_backtest(
    series: &BarSeries,
    config: &BacktestConfig,
    cancel: &CancelToken,
) -> Result<BacktestReport, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;
    let by_symbol = series.by_symbol();
    info!(run_id = %run_id, instruments = by_symbol.len(), bars = series.len(), "backtest started");

    let portfolio = run_portfolio(
        &by_symbol,
        &config.simulation_config(),
        config.portfolio.blend,
        config.metrics.resample_daily,
        cancel,
    )?;
    let completed = portfolio.completed();
    if !completed {
        warn!(run_id = %run_id, "backtest canceled before all bars were processed");
    }

    let rf = config.metrics.risk_free_daily;
    let instruments: Vec<InstrumentSummary> = portfolio
        .instruments
        .iter()
        .zip(&portfolio.curves)
        .map(|(run, curve)| {
            let m = MetricsResult::compute(&curve.points, rf);
            InstrumentSummary {
                symbol: run.symbol.clone(),
                sharpe: m.sharpe,
                max_drawdown: m.max_drawdown,
                trade_count: run.trades.len(),
                rejected_count: run.rejected_count(),
                exposure: run.exposure(),
                initial_cash: run.initial_cash,
                final_equity: run.final_equity(),
                bar_count: run.bars_processed,
                completed: run.completed,
            }
        })
        .collect();

    let metrics = MetricsResult::compute(&portfolio.equity, rf);
    let trades: Vec<TradeRecord> = portfolio
        .instruments
        .into_iter()
        .flat_map(|run| run.trades)
        .collect();

    info!(
        run_id = %run_id,
        trades = trades.len(),
        sharpe = ?metrics.sharpe,
        max_drawdown = ?metrics.max_drawdown,
        "backtest finished"
    );

    Ok(BacktestReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        blend: portfolio.blend,
        equity: portfolio.equity,
        instruments,
        metrics,
        trades,
        completed,
    })
}

/// Load bars through the configured provider, then run.
pub fn run_from_config(config: &BacktestConfig, cancel: &CancelToken) -> Result<BacktestReport, RunError> {
    config.validate()?;
    let provider = build_provider(config)?;
    let series = load_series(provider.as_ref(), config)?;
    run_backtest(&series, config, cancel)
}
