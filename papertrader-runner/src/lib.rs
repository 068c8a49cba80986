//! PaperTrader Runner: backtest orchestration, portfolio blending, metrics.
//!
//! This crate builds on `papertrader-core` to provide:
//! - TOML configuration with deterministic run ids
//! - Provider selection, retry and session filtering
//! - Parallel per-instrument simulation and portfolio blending
//! - Performance metrics and report export

pub mod config;
pub mod export;
pub mod metrics;
pub mod portfolio;
pub mod resample;
pub mod runner;

pub use config::{BacktestConfig, ConfigError, DataSource, RunId};
pub use export::{
    export_equity_csv, export_json, export_trades_csv, import_json, load_artifacts,
    read_equity_csv, save_artifacts, ExportError,
};
pub use metrics::MetricsResult;
pub use portfolio::{blend_equity, run_portfolio, EquityBlend, InstrumentCurve, PortfolioRun};
pub use resample::resample_daily;
pub use runner::{
    build_provider, load_series, run_backtest, run_from_config, BacktestReport,
    InstrumentSummary, RunError, SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn metrics_result_is_send_sync() {
        assert_send::<MetricsResult>();
        assert_sync::<MetricsResult>();
    }

    #[test]
    fn backtest_config_is_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
    }

    #[test]
    fn backtest_report_is_send_sync() {
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
    }

    #[test]
    fn portfolio_run_is_send_sync() {
        assert_send::<PortfolioRun>();
        assert_sync::<PortfolioRun>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<ExportError>();
        assert_sync::<ExportError>();
    }
}
