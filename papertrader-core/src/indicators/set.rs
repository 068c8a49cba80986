//! The indicator bundle one strategy instance reads from.

use super::{Atr, Ema, Indicator};
use crate::domain::Bar;

/// Indicator values at a single bar, all defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub fast: f64,
    pub slow: f64,
    pub atr: f64,
}

impl IndicatorSnapshot {
    pub fn spread(&self) -> f64 {
        self.fast - self.slow
    }
}

/// Precomputed fast EMA, slow EMA and ATR for one instrument.
///
/// Every series is aligned 1:1 with the bars it was computed from.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    fast: Vec<f64>,
    slow: Vec<f64>,
    atr: Vec<f64>,
    warmup: usize,
}

impl IndicatorSet {
    pub fn compute(bars: &[Bar], fast_period: usize, slow_period: usize, atr_period: usize) -> Self {
        let fast = Ema::new(fast_period);
        let slow = Ema::new(slow_period);
        let atr = Atr::new(atr_period);
        let warmup = fast.lookback().max(slow.lookback()).max(atr.lookback());
        Self {
            fast: fast.compute(bars),
            slow: slow.compute(bars),
            atr: atr.compute(bars),
            warmup,
        }
    }

    pub fn len(&self) -> usize {
        self.fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fast.is_empty()
    }

    /// Number of leading bars on which at least one indicator is undefined.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    pub fn fast(&self, index: usize) -> Option<f64> {
        defined(&self.fast, index)
    }

    pub fn slow(&self, index: usize) -> Option<f64> {
        defined(&self.slow, index)
    }

    pub fn atr(&self, index: usize) -> Option<f64> {
        defined(&self.atr, index)
    }

    /// All three values at `index`, or `None` while any is undefined.
    pub fn snapshot(&self, index: usize) -> Option<IndicatorSnapshot> {
        Some(IndicatorSnapshot {
            fast: self.fast(index)?,
            slow: self.slow(index)?,
            atr: self.atr(index)?,
        })
    }

    /// Fast EMA moved from at-or-below the slow EMA to strictly above it
    /// between `index - 1` and `index`.
    pub fn bullish_cross(&self, index: usize) -> bool {
        if index == 0 {
            return false;
        }
        let (Some(prev), Some(curr)) = (self.snapshot(index - 1), self.snapshot(index)) else {
            return false;
        };
        prev.spread() <= 0.0 && curr.spread() > 0.0
    }
}

fn defined(series: &[f64], index: usize) -> Option<f64> {
    series.get(index).copied().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn v_shape() -> Vec<Bar> {
        // Falls for 10 bars then rallies hard
        let mut closes: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        closes.extend((1..=10).map(|i| 91.0 + 2.0 * i as f64));
        make_bars(&closes)
    }

    #[test]
    fn snapshot_undefined_during_warmup() {
        let bars = v_shape();
        let set = IndicatorSet::compute(&bars, 3, 5, 4);
        assert_eq!(set.warmup(), 4);
        for i in 0..4 {
            assert!(set.snapshot(i).is_none(), "bar {i} should be warming up");
        }
        assert!(set.snapshot(4).is_some());
        assert_eq!(set.len(), bars.len());
    }

    #[test]
    fn crossover_fires_once_on_rally() {
        let bars = v_shape();
        let set = IndicatorSet::compute(&bars, 3, 5, 4);
        let crosses: Vec<usize> = (0..bars.len()).filter(|&i| set.bullish_cross(i)).collect();
        assert_eq!(crosses.len(), 1, "crosses at {crosses:?}");
        let i = crosses[0];
        assert!(set.snapshot(i - 1).unwrap().spread() <= 0.0);
        assert!(set.snapshot(i).unwrap().spread() > 0.0);
    }

    #[test]
    fn persistent_positive_spread_does_not_retrigger() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let set = IndicatorSet::compute(&bars, 3, 5, 3);
        assert!((0..bars.len()).all(|i| !set.bullish_cross(i)));
    }

    #[test]
    fn out_of_range_index_is_undefined() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let set = IndicatorSet::compute(&bars, 1, 1, 1);
        assert!(set.snapshot(10).is_none());
        assert!(!set.bullish_cross(10));
    }
}
