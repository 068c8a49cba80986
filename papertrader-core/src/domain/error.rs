//! Input validation errors.
//!
//! Raised before a simulation starts. Nothing downstream of a validated
//! `BarSeries` or `StrategyParams` returns these.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("bar series is empty")]
    EmptySeries,

    #[error("bar {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("bar {index} has invalid {field}: {value}")]
    InvalidField {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error(
        "timestamps for '{symbol}' are not strictly increasing at bar {index} ({previous} -> {current})"
    )]
    NonMonotonicTimestamps {
        symbol: String,
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("unsupported stop mode '{0}' (expected 'atr' or 'percent')")]
    UnsupportedStopMode(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no data received: {0}")]
    NoData(String),
}
