//! Serializable backtest configuration.
//!
//! Loaded from TOML. Every section is optional and falls back to the
//! defaults below, so an empty file is a valid configuration.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use papertrader_core::data::{SessionWindow, Timeframe};
use papertrader_core::domain::InputError;
use papertrader_core::engine::{CostModel, SimulationConfig, TieBreak};
use papertrader_core::strategy::StrategyParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::portfolio::EquityBlend;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid strategy parameters: {0}")]
    Strategy(#[from] InputError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Complete configuration for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub execution: ExecutionSection,
    pub sizing: SizingSection,
    pub strategy: StrategyParams,
    pub portfolio: PortfolioSection,
    pub metrics: MetricsSection,
    pub data: DataSection,
}

/// Universe, date range and capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub symbols: Vec<String>,
    /// First day of data (inclusive, UTC).
    pub start: NaiveDate,
    /// Last day of data (inclusive, UTC).
    pub end: NaiveDate,
    pub timeframe: Timeframe,
    /// Total starting cash, split evenly across symbols.
    pub initial_cash: f64,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            symbols: vec!["SPY".to_string()],
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            timeframe: Timeframe::default(),
            initial_cash: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Commission as a fraction of notional (0.0005 = 5 bps).
    pub commission_rate: f64,
    pub slippage_bps: f64,
    pub tie_break: TieBreak,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            commission_rate: 0.0005,
            slippage_bps: 5.0,
            tie_break: TieBreak::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingSection {
    /// Fraction of cash risked per trade.
    pub risk_fraction: f64,
    pub min_size: u64,
}

impl Default for SizingSection {
    fn default() -> Self {
        Self {
            risk_fraction: 0.01,
            min_size: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSection {
    pub blend: EquityBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub risk_free_daily: f64,
    /// Sample every equity curve at the last point of each UTC day first.
    pub resample_daily: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            risk_free_daily: 0.0,
            resample_daily: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Synthetic,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSource,
    pub csv_path: Option<PathBuf>,
    /// Seed for the synthetic provider.
    pub seed: u64,
    pub session: Option<SessionWindow>,
    pub retry_attempts: u32,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            csv_path: None,
            seed: 42,
            session: None,
            retry_attempts: 3,
        }
    }
}

impl BacktestConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.symbols.is_empty() {
            return Err(invalid("backtest.symbols", "at least one symbol is required"));
        }
        let mut seen = BTreeSet::new();
        for symbol in &bt.symbols {
            if symbol.trim().is_empty() {
                return Err(invalid("backtest.symbols", "symbols must be non-empty"));
            }
            if !seen.insert(symbol.as_str()) {
                return Err(invalid("backtest.symbols", format!("duplicate symbol '{symbol}'")));
            }
        }
        if bt.end < bt.start {
            return Err(invalid(
                "backtest.end",
                format!("{} is before start {}", bt.end, bt.start),
            ));
        }
        if !(bt.initial_cash.is_finite() && bt.initial_cash > 0.0) {
            return Err(invalid("backtest.initial_cash", "must be positive"));
        }

        let ex = &self.execution;
        if !(ex.commission_rate.is_finite() && ex.commission_rate >= 0.0) {
            return Err(invalid("execution.commission_rate", "must be non-negative"));
        }
        if !(ex.slippage_bps.is_finite() && ex.slippage_bps >= 0.0) {
            return Err(invalid("execution.slippage_bps", "must be non-negative"));
        }

        let sz = &self.sizing;
        if !(sz.risk_fraction > 0.0 && sz.risk_fraction <= 1.0) {
            return Err(invalid("sizing.risk_fraction", "must be in (0, 1]"));
        }
        if sz.min_size == 0 {
            return Err(invalid("sizing.min_size", "must be at least 1"));
        }

        self.strategy.validate()?;

        if !self.metrics.risk_free_daily.is_finite() {
            return Err(invalid("metrics.risk_free_daily", "must be finite"));
        }
        if self.data.source == DataSource::Csv && self.data.csv_path.is_none() {
            return Err(invalid("data.csv_path", "required when data.source = \"csv\""));
        }
        Ok(())
    }

    /// Deterministic hash of the canonical JSON form.
    ///
    /// Two identical configurations share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Per-instrument simulation settings. `initial_cash` is the total;
    /// the portfolio splits it.
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            initial_cash: self.backtest.initial_cash,
            cost_model: CostModel::new(self.execution.slippage_bps, self.execution.commission_rate),
            tie_break: self.execution.tie_break,
            risk_fraction: self.sizing.risk_fraction,
            min_size: self.sizing.min_size,
            strategy: self.strategy.clone(),
        }
    }

    /// `[start 00:00, end 23:59:59]` in UTC.
    pub fn date_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let day_end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        (
            Utc.from_utc_datetime(&self.backtest.start.and_time(NaiveTime::MIN)),
            Utc.from_utc_datetime(&self.backtest.end.and_time(day_end)),
        )
    }
}
