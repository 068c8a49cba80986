//! CSV bar files: `timestamp,open,high,low,close,volume,symbol`.
//!
//! Timestamps are RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), or a bare date
//! (midnight UTC). Blank numeric cells are reported as missing fields.

use super::provider::{BarProvider, ProviderError, Timeframe};
use crate::domain::{Bar, BarSeries, InputError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    symbol: String,
}

/// Reads bars from a single CSV file recorded at one timeframe.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
    timeframe: Timeframe,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>, timeframe: Timeframe) -> Self {
        Self {
            path: path.into(),
            timeframe,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BarProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_bars(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BarSeries, ProviderError> {
        if timeframe != self.timeframe {
            return Err(ProviderError::UnsupportedTimeframe(timeframe.to_string()));
        }
        let file = std::fs::File::open(&self.path).map_err(|source| ProviderError::Io {
            path: self.path.clone(),
            source,
        })?;
        let bars = read_bars(file)?;
        let total = bars.len();
        let kept: Vec<Bar> = bars
            .into_iter()
            .filter(|b| symbols.is_empty() || symbols.contains(&b.symbol))
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();
        debug!(path = %self.path.display(), total, kept = kept.len(), "csv bars loaded");
        if kept.is_empty() {
            return Err(ProviderError::Empty {
                symbols: symbols.join(","),
                start,
                end,
            });
        }
        Ok(BarSeries::new(kept)?)
    }
}

/// Parse every record of a bar CSV. Validation beyond parsing is left to
/// `BarSeries::new`.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, ProviderError> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .from_reader(reader);
    let mut bars = Vec::new();
    for (index, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = record.map_err(|e| ProviderError::Malformed {
            row: index + 1,
            reason: e.to_string(),
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| ProviderError::Malformed {
            row: index + 1,
            reason: format!("unparseable timestamp '{}'", row.timestamp),
        })?;
        let field = |value: Option<f64>, name: &'static str| {
            value.ok_or(InputError::MissingField { index, field: name })
        };
        bars.push(Bar::new(
            timestamp,
            row.symbol,
            field(row.open, "open")?,
            field(row.high, "high")?,
            field(row.low, "low")?,
            field(row.close, "close")?,
            field(row.volume, "volume")?,
        ));
    }
    Ok(bars)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    const SAMPLE: &str = "\
timestamp,open,high,low,close,volume,symbol
2024-01-02,100,101,99,100.5,1000,SPY
2024-01-03,100.5,102,100,101.5,1100,SPY
2024-01-02T00:00:00Z,50,51,49,50.5,500,QQQ
2024-01-04 00:00:00,101.5,103,101,102,1200,SPY
";

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn write_sample(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_all_timestamp_formats() {
        let bars = read_bars(SAMPLE.as_bytes()).unwrap();
        assert_eq!(bars.len(), 4);
        assert_eq!(bars[0].timestamp, utc(2024, 1, 2));
        assert_eq!(bars[2].timestamp, utc(2024, 1, 2));
        assert_eq!(bars[3].timestamp, utc(2024, 1, 4));
        assert_eq!(bars[2].symbol, "QQQ");
    }

    #[test]
    fn blank_cell_is_a_missing_field() {
        let csv = "timestamp,open,high,low,close,volume,symbol\n2024-01-02,100,,99,100,1,SPY\n";
        assert!(matches!(
            read_bars(csv.as_bytes()),
            Err(ProviderError::Invalid(InputError::MissingField { field: "high", .. }))
        ));
    }

    #[test]
    fn filters_symbols_and_range() {
        let file = write_sample(SAMPLE);
        let provider = CsvProvider::new(file.path(), Timeframe::D1);
        let series = provider
            .fetch_bars(&["SPY".into()], Timeframe::D1, utc(2024, 1, 3), utc(2024, 1, 31))
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.symbols(), vec!["SPY".to_string()]);
    }

    #[test]
    fn empty_selection_is_reported() {
        let file = write_sample(SAMPLE);
        let provider = CsvProvider::new(file.path(), Timeframe::D1);
        let err = provider
            .fetch_bars(&["IWM".into()], Timeframe::D1, utc(2024, 1, 1), utc(2024, 1, 31))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Empty { .. }));
    }

    #[test]
    fn timeframe_mismatch_is_refused() {
        let file = write_sample(SAMPLE);
        let provider = CsvProvider::new(file.path(), Timeframe::D1);
        assert!(matches!(
            provider.fetch_bars(&[], Timeframe::M5, utc(2024, 1, 1), utc(2024, 1, 31)),
            Err(ProviderError::UnsupportedTimeframe(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let provider = CsvProvider::new("/nonexistent/bars.csv", Timeframe::D1);
        assert!(matches!(
            provider.fetch_bars(&[], Timeframe::D1, utc(2024, 1, 1), utc(2024, 1, 31)),
            Err(ProviderError::Io { .. })
        ));
    }

    #[test]
    fn out_of_order_rows_fail_validation() {
        let csv = "timestamp,open,high,low,close,volume,symbol\n\
2024-01-03,100,101,99,100,1,SPY\n\
2024-01-02,100,101,99,100,1,SPY\n";
        let file = write_sample(csv);
        let provider = CsvProvider::new(file.path(), Timeframe::D1);
        assert!(matches!(
            provider.fetch_bars(&[], Timeframe::D1, utc(2024, 1, 1), utc(2024, 1, 31)),
            Err(ProviderError::Invalid(InputError::NonMonotonicTimestamps { .. }))
        ));
    }
}
