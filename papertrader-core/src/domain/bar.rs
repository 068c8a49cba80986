//! Bar and validated bar series: the fundamental market data units.

use super::error::InputError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// OHLCV bar for a single symbol at a single timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        symbol: impl Into<String>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    fn validate(&self, index: usize) -> Result<(), InputError> {
        if self.symbol.trim().is_empty() {
            return Err(InputError::MissingField {
                index,
                field: "symbol",
            });
        }
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in prices {
            if value.is_nan() {
                return Err(InputError::MissingField { index, field });
            }
            if !value.is_finite() || value <= 0.0 {
                return Err(InputError::InvalidField {
                    index,
                    field,
                    value,
                });
            }
        }
        if self.volume.is_nan() {
            return Err(InputError::MissingField {
                index,
                field: "volume",
            });
        }
        if self.volume < 0.0 {
            return Err(InputError::InvalidField {
                index,
                field: "volume",
                value: self.volume,
            });
        }
        if self.high < self.low {
            return Err(InputError::InvalidField {
                index,
                field: "high",
                value: self.high,
            });
        }
        Ok(())
    }
}

/// A validated, symbol-tagged bar series.
///
/// Construction guarantees the series is non-empty, every bar carries all
/// required fields, and timestamps are strictly increasing within each symbol.
/// Bars for different symbols may be interleaved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, InputError> {
        if bars.is_empty() {
            return Err(InputError::EmptySeries);
        }

        let mut last_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for (index, bar) in bars.iter().enumerate() {
            bar.validate(index)?;
            if let Some(&previous) = last_seen.get(bar.symbol.as_str()) {
                if bar.timestamp <= previous {
                    return Err(InputError::NonMonotonicTimestamps {
                        symbol: bar.symbol.clone(),
                        index,
                        previous,
                        current: bar.timestamp,
                    });
                }
            }
            last_seen.insert(bar.symbol.as_str(), bar.timestamp);
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        self.by_symbol().into_keys().collect()
    }

    /// Split into per-symbol series, preserving timestamp order.
    pub fn by_symbol(&self) -> BTreeMap<String, Vec<Bar>> {
        let mut grouped: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for bar in &self.bars {
            grouped.entry(bar.symbol.clone()).or_default().push(bar.clone());
        }
        grouped
    }

    /// Keep only bars matching `keep`. Fails if nothing is left.
    pub fn retain<F>(self, mut keep: F) -> Result<Self, InputError>
    where
        F: FnMut(&Bar) -> bool,
    {
        let bars: Vec<Bar> = self.bars.into_iter().filter(|b| keep(b)).collect();
        if bars.is_empty() {
            return Err(InputError::EmptySeries);
        }
        Ok(Self { bars })
    }
}
