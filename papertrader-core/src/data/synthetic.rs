//! Seeded random-walk bars for offline runs and tests.
//!
//! Each symbol draws from its own `StdRng` whose seed is derived from the
//! master seed and the symbol via BLAKE3, so a symbol's bars do not depend on
//! which other symbols were requested.

use super::provider::{BarProvider, ProviderError, Timeframe};
use crate::domain::{Bar, BarSeries};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticProvider {
    pub seed: u64,
    pub start_price: f64,
    /// Per-bar drift as a fraction of price.
    pub drift: f64,
    /// Per-bar volatility as a fraction of price.
    pub volatility: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 100.0,
            drift: 0.0002,
            volatility: 0.01,
        }
    }
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    fn symbol_seed(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Generate one symbol's bars at every `timeframe` step in `[start, end]`.
    pub fn generate(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(self.symbol_seed(symbol));
        let step = timeframe.duration();
        let mut bars = Vec::new();
        let mut close = self.start_price;
        let mut ts = start;
        while ts <= end {
            let open = close;
            let shock: f64 = rng.gen_range(-1.0..1.0);
            close = (open * (1.0 + self.drift + self.volatility * shock)).max(0.01);
            let wick_up: f64 = rng.gen_range(0.0..0.5);
            let wick_down: f64 = rng.gen_range(0.0..0.5);
            let high = open.max(close) * (1.0 + self.volatility * wick_up);
            let low = (open.min(close) * (1.0 - self.volatility * wick_down)).max(0.005);
            let volume = rng.gen_range(1_000.0..10_000.0_f64).round();
            bars.push(Bar::new(ts, symbol, open, high, low, close, volume));
            ts += step;
        }
        bars
    }
}

impl BarProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_bars(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BarSeries, ProviderError> {
        let bars: Vec<Bar> = symbols
            .iter()
            .flat_map(|s| self.generate(s, timeframe, start, end))
            .collect();
        if bars.is_empty() {
            return Err(ProviderError::Empty {
                symbols: symbols.join(","),
                start,
                end,
            });
        }
        Ok(BarSeries::new(bars)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn deterministic_per_seed() {
        let (start, end) = range();
        let a = SyntheticProvider::new(7).generate("SPY", Timeframe::D1, start, end);
        let b = SyntheticProvider::new(7).generate("SPY", Timeframe::D1, start, end);
        let c = SyntheticProvider::new(8).generate("SPY", Timeframe::D1, start, end);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn symbols_are_independent() {
        let (start, end) = range();
        let provider = SyntheticProvider::new(1);
        let alone = provider.generate("QQQ", Timeframe::D1, start, end);
        let series = provider
            .fetch_bars(&["SPY".into(), "QQQ".into()], Timeframe::D1, start, end)
            .unwrap();
        let together = series.by_symbol().remove("QQQ").unwrap();
        assert_eq!(alone, together);
    }

    #[test]
    fn bars_are_valid_and_spaced() {
        let (start, end) = range();
        let bars = SyntheticProvider::default().generate("SPY", Timeframe::D1, start, end);
        assert_eq!(bars.len(), 91);
        assert!(bars.iter().all(|b| b.is_sane()));
        assert!(bars.windows(2).all(|w| w[1].timestamp - w[0].timestamp == Timeframe::D1.duration()));
    }

    #[test]
    fn inverted_range_is_empty() {
        let (start, end) = range();
        let err = SyntheticProvider::default()
            .fetch_bars(&["SPY".into()], Timeframe::D1, end, start)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Empty { .. }));
    }
}
