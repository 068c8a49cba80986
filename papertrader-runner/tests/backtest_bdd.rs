//! BDD tests for the portfolio backtest runner.
//!
//! These tests drive the public API end to end:
//! - Provider selection (synthetic, CSV) and session filtering
//! - Parallel per-instrument runs and equity blending
//! - Cancellation and error surfacing
//! - Artifact export

use std::io::Write;

use papertrader_core::data::{SessionWindow, Timeframe};
use papertrader_core::domain::InputError;
use papertrader_core::engine::CancelToken;
use papertrader_runner::{
    build_provider, load_artifacts, load_series, read_equity_csv, run_backtest, run_from_config,
    save_artifacts, BacktestConfig, DataSource, EquityBlend, RunError,
};

fn daily_config(symbols: &[&str]) -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.backtest.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.backtest.timeframe = Timeframe::D1;
    config
}

#[test]
fn bdd_intraday_session_run_resamples_to_daily_points() {
    // GIVEN two symbols of synthetic 15-minute bars over January
    let mut config = daily_config(&["SPY", "QQQ"]);
    config.backtest.timeframe = Timeframe::M15;
    config.backtest.end = chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    // AND a 09:30-16:00 session
    config.data.session = Some(SessionWindow::default());

    // WHEN the backtest runs
    let report = run_from_config(&config, &CancelToken::new()).expect("run should succeed");

    // THEN each instrument saw 27 session bars per day
    assert!(report.instruments.iter().all(|i| i.bar_count == 27 * 31));
    // AND the portfolio curve has one point per day, relative to starting cash
    assert_eq!(report.equity.len(), 31);
    assert!((report.equity[0].equity - 1.0).abs() < 0.05);
    assert!(report.completed);
}

#[test]
fn bdd_blend_choice_changes_scale_not_shape() {
    // GIVEN the same daily run blended two ways
    let relative = daily_config(&["SPY", "QQQ"]);
    let mut notional = relative.clone();
    notional.portfolio.blend = EquityBlend::NotionalSum;

    // WHEN both run
    let a = run_from_config(&relative, &CancelToken::new()).unwrap();
    let b = run_from_config(&notional, &CancelToken::new()).unwrap();

    // THEN the first point is 1.0 relative, total cash notional (no position on bar one)
    assert_eq!(a.equity[0].equity, 1.0);
    assert_eq!(b.equity[0].equity, 100_000.0);
    // AND with equal allocations the curves differ only by the total cash
    for (x, y) in a.equity.iter().zip(&b.equity) {
        assert!((x.equity * 100_000.0 - y.equity).abs() < 1e-6);
    }
    // AND the run ids differ because the configs differ
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn bdd_same_config_is_deterministic() {
    let config = daily_config(&["SPY", "IWM"]);
    let a = run_from_config(&config, &CancelToken::new()).unwrap();
    let b = run_from_config(&config, &CancelToken::new()).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.equity, b.equity);
    assert_eq!(a.trades, b.trades);
}

#[test]
fn bdd_csv_source_blends_only_common_days() {
    // GIVEN a CSV where QQQ starts two days after SPY
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume,symbol").unwrap();
    for day in 1..=20 {
        let c = 100.0 + day as f64;
        writeln!(file, "2024-01-{day:02},{c},{},{},{c},1000,SPY", c + 1.0, c - 1.0).unwrap();
        if day > 2 {
            writeln!(file, "2024-01-{day:02},{c},{},{},{c},1000,QQQ", c + 1.0, c - 1.0).unwrap();
        }
    }
    let mut config = daily_config(&["SPY", "QQQ"]);
    config.data.source = DataSource::Csv;
    config.data.csv_path = Some(file.path().to_path_buf());

    // WHEN the backtest runs
    let report = run_from_config(&config, &CancelToken::new()).unwrap();

    // THEN the portfolio curve starts on the first shared day
    assert_eq!(report.equity.len(), 18);
    assert_eq!(report.equity[0].timestamp.date_naive().to_string(), "2024-01-03");
    assert!(report.equity.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn bdd_missing_csv_is_reported_as_no_data() {
    let mut config = daily_config(&["SPY"]);
    config.data.source = DataSource::Csv;
    config.data.csv_path = Some("/nonexistent/bars.csv".into());
    config.data.retry_attempts = 1;

    let err = run_from_config(&config, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, RunError::Input(InputError::NoData(_))));
}

#[test]
fn bdd_canceled_run_is_flagged_incomplete() {
    // GIVEN loaded bars and a token canceled up front
    let config = daily_config(&["SPY", "QQQ"]);
    let provider = build_provider(&config).unwrap();
    let series = load_series(provider.as_ref(), &config).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    // WHEN the backtest runs
    let report = run_backtest(&series, &config, &cancel).unwrap();

    // THEN nothing was simulated and the report says so
    assert!(!report.completed);
    assert!(report.instruments.iter().all(|i| !i.completed && i.bar_count == 0));
    assert!(report.equity.is_empty());
    assert!(report.metrics.is_empty());
}

#[test]
fn bdd_artifacts_are_written_and_reloadable() {
    // GIVEN a finished run
    let config = daily_config(&["SPY"]);
    let report = run_from_config(&config, &CancelToken::new()).unwrap();
    let out = tempfile::tempdir().unwrap();

    // WHEN artifacts are saved
    let dir = save_artifacts(&report, out.path()).unwrap();

    // THEN the report reloads with the same identity
    let loaded = load_artifacts(&dir).unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.trades.len(), report.trades.len());
    // AND the equity CSV has every portfolio point
    let curve = read_equity_csv(&dir.join("equity.csv")).unwrap();
    assert_eq!(curve.len(), report.equity.len());
}
