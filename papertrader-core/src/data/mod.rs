//! Data: bar sources and pre-simulation filters.
//!
//! Providers sit outside the simulation: they produce a validated
//! `BarSeries` and nothing downstream knows where it came from.

pub mod csv;
pub mod provider;
pub mod retry;
pub mod session;
pub mod synthetic;

pub use self::csv::CsvProvider;
pub use provider::{BarProvider, ProviderError, Timeframe};
pub use retry::{RetryPolicy, RetryingProvider};
pub use session::SessionWindow;
pub use synthetic::SyntheticProvider;
