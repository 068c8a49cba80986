//! Report export: JSON and CSV artifacts.
//!
//! - **JSON**: the full `BacktestReport`, schema-versioned
//! - **CSV**: portfolio equity curve and trade log for external tools
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use papertrader_core::data::csv::parse_timestamp;
use papertrader_core::domain::{EquityPoint, TradeRecord};
use thiserror::Error;
use tracing::info;

use crate::runner::{BacktestReport, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("bad equity row {row}: {reason}")]
    BadRow { row: usize, reason: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &BacktestReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<BacktestReport, ExportError> {
    let report: BacktestReport = serde_json::from_str(json)?;
    if report.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: report.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: timestamp (RFC 3339), equity.
pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for p in curve {
        wtr.write_record([p.timestamp.to_rfc3339(), format!("{:.6}", p.equity)])?;
    }
    into_string(wtr)
}

/// Columns: symbol, entry_time, entry_price, exit_time, exit_price,
/// quantity, exit_reason, commission, net_pnl, bars_held.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "entry_time",
        "entry_price",
        "exit_time",
        "exit_price",
        "quantity",
        "exit_reason",
        "commission",
        "net_pnl",
        "bars_held",
    ])?;
    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            t.quantity.to_string(),
            serde_json::to_value(t.exit_reason)?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.net_pnl),
            t.bars_held.to_string(),
        ])?;
    }
    into_string(wtr)
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))?;
    String::from_utf8(data).map_err(|e| ExportError::BadRow {
        row: 0,
        reason: format!("output is not UTF-8: {e}"),
    })
}

/// Read a `timestamp,equity` CSV, as written by [`export_equity_csv`].
pub fn read_equity_csv(path: &Path) -> Result<Vec<EquityPoint>, ExportError> {
    let file = std::fs::File::open(path).map_err(io_err(path))?;
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut curve: Vec<EquityPoint> = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let (Some(ts), Some(eq)) = (record.get(0), record.get(1)) else {
            return Err(ExportError::BadRow {
                row,
                reason: "expected timestamp,equity".into(),
            });
        };
        let timestamp = parse_timestamp(ts).ok_or_else(|| ExportError::BadRow {
            row,
            reason: format!("unparseable timestamp '{ts}'"),
        })?;
        let equity: f64 = eq.parse().map_err(|_| ExportError::BadRow {
            row,
            reason: format!("unparseable equity '{eq}'"),
        })?;
        if curve.last().is_some_and(|p| p.timestamp >= timestamp) {
            return Err(ExportError::BadRow {
                row,
                reason: "timestamps must be strictly increasing".into(),
            });
        }
        curve.push(EquityPoint::new(timestamp, equity));
    }
    Ok(curve)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a run under `output_dir/{run_id prefix}/`:
/// - `report.json`: the full `BacktestReport`
/// - `equity.csv`: portfolio equity curve
/// - `trades.csv`: trade log
///
/// Returns the created directory.
pub fn save_artifacts(report: &BacktestReport, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let short_id: String = report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(short_id);
    std::fs::create_dir_all(&run_dir).map_err(io_err(&run_dir))?;

    let files = [
        ("report.json", export_json(report)?),
        ("equity.csv", export_equity_csv(&report.equity)?),
        ("trades.csv", export_trades_csv(&report.trades)?),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents).map_err(io_err(&path))?;
    }
    info!(dir = %run_dir.display(), "artifacts written");
    Ok(run_dir)
}

/// Load a report from an artifact directory's `report.json`.
pub fn load_artifacts(dir: &Path) -> Result<BacktestReport, ExportError> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).map_err(io_err(&path))?;
    import_json(&json)
}
