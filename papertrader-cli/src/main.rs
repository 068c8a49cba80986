//! PaperTrader CLI: run backtests, score equity curves, generate bars.
//!
//! Commands:
//! - `run`: execute a portfolio backtest from a TOML config (plus overrides)
//! - `metrics`: compute metrics for an exported equity CSV
//! - `synthetic`: write seeded random-walk bars in the CSV provider format

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use papertrader_core::data::{SyntheticProvider, Timeframe};
use papertrader_core::engine::CancelToken;
use papertrader_runner::{
    read_equity_csv, resample_daily, run_from_config, save_artifacts, BacktestConfig,
    BacktestReport, DataSource, MetricsResult,
};

#[derive(Parser)]
#[command(
    name = "papertrader",
    about = "PaperTrader CLI: EMA crossover bracket backtester"
)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a portfolio backtest.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols, comma-separated (overrides the config).
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Bar timeframe: 1m, 5m, 15m, 1h or D.
        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// Read bars from this CSV file instead of the configured source.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Output directory for report.json, equity.csv and trades.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Skip writing artifacts.
        #[arg(long, default_value_t = false)]
        no_export: bool,
    },
    /// Compute metrics for a `timestamp,equity` CSV and print them as JSON.
    Metrics {
        /// Equity CSV, as written by `run`.
        equity: PathBuf,

        /// Daily risk-free rate subtracted from returns.
        #[arg(long, default_value_t = 0.0)]
        risk_free_daily: f64,

        /// Sample the curve at the last point of each UTC day first.
        #[arg(long, default_value_t = false)]
        daily: bool,
    },
    /// Generate synthetic bars as CSV.
    Synthetic {
        /// Symbols to generate.
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2024-01-01")]
        start: NaiveDate,

        /// End date (YYYY-MM-DD).
        #[arg(long, default_value = "2024-12-31")]
        end: NaiveDate,

        /// Bar timeframe: 1m, 5m, 15m, 1h or D.
        #[arg(long, default_value = "D")]
        timeframe: Timeframe,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            config,
            symbols,
            start,
            end,
            timeframe,
            csv,
            output_dir,
            no_export,
        } => {
            let mut config = match config {
                Some(path) => BacktestConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => BacktestConfig::default(),
            };
            if !symbols.is_empty() {
                config.backtest.symbols = symbols;
            }
            if let Some(start) = start {
                config.backtest.start = start;
            }
            if let Some(end) = end {
                config.backtest.end = end;
            }
            if let Some(tf) = timeframe {
                config.backtest.timeframe = tf;
            }
            if let Some(path) = csv {
                config.data.source = DataSource::Csv;
                config.data.csv_path = Some(path);
            }
            run_cmd(&config, (!no_export).then_some(output_dir))
        }
        Commands::Metrics {
            equity,
            risk_free_daily,
            daily,
        } => metrics_cmd(equity, risk_free_daily, daily),
        Commands::Synthetic {
            symbols,
            start,
            end,
            timeframe,
            seed,
            output,
        } => synthetic_cmd(&symbols, start, end, timeframe, seed, output),
    }
}

/// Logs go to stderr so stdout stays clean for JSON output.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_cmd(config: &BacktestConfig, output_dir: Option<PathBuf>) -> Result<()> {
    let report = run_from_config(config, &CancelToken::new())?;
    print_summary(&report);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&report, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn metrics_cmd(path: PathBuf, risk_free_daily: f64, daily: bool) -> Result<()> {
    if !risk_free_daily.is_finite() {
        bail!("--risk-free-daily must be finite");
    }
    let mut curve = read_equity_csv(&path).with_context(|| format!("reading {}", path.display()))?;
    if daily {
        curve = resample_daily(&curve);
    }
    let metrics = MetricsResult::compute(&curve, risk_free_daily);
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

fn synthetic_cmd(
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
    timeframe: Timeframe,
    seed: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    if end < start {
        bail!("--end {end} is before --start {start}");
    }
    let day_end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
    let from = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
    let to = Utc.from_utc_datetime(&end.and_time(day_end));
    let provider = SyntheticProvider::new(seed);

    let mut out: Box<dyn Write> = match &output {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut wtr = csv::Writer::from_writer(&mut out);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume", "symbol"])?;
    let mut rows = 0usize;
    for symbol in symbols {
        for bar in provider.generate(symbol, timeframe, from, to) {
            wtr.write_record([
                bar.timestamp.to_rfc3339(),
                format!("{:.4}", bar.open),
                format!("{:.4}", bar.high),
                format!("{:.4}", bar.low),
                format!("{:.4}", bar.close),
                format!("{}", bar.volume),
                bar.symbol,
            ])?;
            rows += 1;
        }
    }
    wtr.flush()?;
    info!(rows, symbols = symbols.len(), %timeframe, seed, "synthetic bars written");
    Ok(())
}

fn print_summary(report: &BacktestReport) {
    let pct = |v: Option<f64>| v.map_or("n/a".to_string(), |x| format!("{:.2}%", x * 100.0));
    let ratio = |v: Option<f64>| v.map_or("n/a".to_string(), |x| format!("{x:.3}"));

    println!();
    println!("=== Backtest Report ===");
    println!("Run:            {}", report.run_id);
    println!(
        "Period:         {} to {} ({})",
        report.config.backtest.start, report.config.backtest.end, report.config.backtest.timeframe
    );
    println!("Blend:          {:?}", report.blend);
    println!("Points:         {}", report.equity.len());
    println!("Trades:         {}", report.trades.len());
    println!();
    println!("--- Performance ---");
    println!("CAGR:           {}", pct(report.metrics.cagr));
    println!("Sharpe:         {}", ratio(report.metrics.sharpe));
    println!("Sortino:        {}", ratio(report.metrics.sortino));
    println!("Calmar:         {}", ratio(report.metrics.calmar));
    println!("Max Drawdown:   {}", pct(report.metrics.max_drawdown));
    println!("Avg Daily Ret:  {}", pct(report.metrics.avg_daily_return));
    println!("Daily Vol:      {}", pct(report.metrics.vol_daily));
    println!();
    println!("--- Instruments ---");
    for i in &report.instruments {
        println!(
            "{:<8} sharpe {:>8}  mdd {:>8}  trades {:>4}  rejected {:>3}  exposure {:>6.1}%  final {:>12.2}",
            i.symbol,
            ratio(i.sharpe),
            pct(i.max_drawdown),
            i.trade_count,
            i.rejected_count,
            i.exposure * 100.0,
            i.final_equity
        );
    }
    if !report.completed {
        println!();
        println!("WARNING: run was canceled before all bars were processed");
    }
}
