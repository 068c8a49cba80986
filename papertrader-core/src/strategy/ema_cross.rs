//! EMA crossover entries with bracket exits and an optional time stop.

use super::params::StrategyParams;
use crate::domain::{Bar, InputError, OrderId, OrderIntent, OrderRole};
use crate::engine::OrderEvent;
use crate::indicators::IndicatorSet;
use crate::sizers::Sizer;
use tracing::debug;

/// Per-instrument strategy state.
///
/// `pending` holds the id of a submitted order whose outcome has not been
/// reported yet. While it is set the engine takes no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Flat { pending: Option<OrderId> },
    InPosition { bars_held: u32, pending: Option<OrderId> },
}

impl Default for StrategyState {
    fn default() -> Self {
        StrategyState::Flat { pending: None }
    }
}

impl StrategyState {
    pub fn is_flat(&self) -> bool {
        matches!(self, StrategyState::Flat { .. })
    }

    pub fn pending(&self) -> Option<OrderId> {
        match self {
            StrategyState::Flat { pending } | StrategyState::InPosition { pending, .. } => *pending,
        }
    }
}

/// Drives one instrument bar by bar.
///
/// Per bar the caller first reports the broker's order events with
/// [`StrategyEngine::on_order_events`], then asks for at most one intent with
/// [`StrategyEngine::on_bar`], and acknowledges an accepted submission with
/// [`StrategyEngine::order_submitted`].
pub struct StrategyEngine {
    params: StrategyParams,
    sizer: Box<dyn Sizer>,
    indicators: IndicatorSet,
    state: StrategyState,
}

impl StrategyEngine {
    /// Validate parameters and precompute indicators over `bars`.
    pub fn new(
        params: StrategyParams,
        sizer: Box<dyn Sizer>,
        bars: &[Bar],
    ) -> Result<Self, InputError> {
        params.validate()?;
        let indicators = IndicatorSet::compute(
            bars,
            params.fast_period,
            params.slow_period,
            params.atr_period,
        );
        Ok(Self {
            params,
            sizer,
            indicators,
            state: StrategyState::default(),
        })
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    /// Apply fills, cancellations and rejections reported by the broker.
    pub fn on_order_events(&mut self, events: &[OrderEvent]) {
        for event in events {
            self.state = match (self.state, event) {
                (StrategyState::Flat { pending: Some(id) }, OrderEvent::Filled { order_id, .. })
                    if *order_id == id =>
                {
                    StrategyState::InPosition {
                        bars_held: 0,
                        pending: None,
                    }
                }
                (
                    StrategyState::Flat { pending: Some(id) },
                    OrderEvent::Rejected { order_id, .. } | OrderEvent::Canceled { order_id, .. },
                ) if *order_id == id => StrategyState::Flat { pending: None },
                (
                    StrategyState::InPosition { .. },
                    OrderEvent::Filled {
                        role: OrderRole::StopLoss | OrderRole::TakeProfit | OrderRole::Close,
                        ..
                    },
                ) => StrategyState::Flat { pending: None },
                (
                    StrategyState::InPosition { bars_held, pending: Some(id) },
                    OrderEvent::Rejected { order_id, .. } | OrderEvent::Canceled { order_id, .. },
                ) if *order_id == id => StrategyState::InPosition {
                    bars_held,
                    pending: None,
                },
                (state, _) => state,
            };
        }
    }

    /// Decide the action for bar `index`. Returns at most one intent.
    pub fn on_bar(&mut self, index: usize, bar: &Bar, cash: f64, position_qty: u64) -> Option<OrderIntent> {
        match self.state {
            StrategyState::Flat { pending: Some(_) }
            | StrategyState::InPosition {
                pending: Some(_), ..
            } => None,
            StrategyState::InPosition {
                bars_held,
                pending: None,
            } => {
                let bars_held = bars_held + 1;
                self.state = StrategyState::InPosition {
                    bars_held,
                    pending: None,
                };
                match self.params.max_bars_held {
                    Some(max) if bars_held >= max && position_qty > 0 => {
                        debug!(symbol = %bar.symbol, index, bars_held, "time stop");
                        Some(OrderIntent::close_at_market(position_qty))
                    }
                    _ => None,
                }
            }
            StrategyState::Flat { pending: None } => self.entry_intent(index, bar, cash),
        }
    }

    fn entry_intent(&self, index: usize, bar: &Bar, cash: f64) -> Option<OrderIntent> {
        let snapshot = self.indicators.snapshot(index)?;
        if !self.indicators.bullish_cross(index) {
            return None;
        }
        let entry = bar.close;
        let Some((stop, target)) = self.params.bracket_levels(entry, snapshot.atr) else {
            debug!(symbol = %bar.symbol, index, atr = snapshot.atr, "crossover skipped: degenerate levels");
            return None;
        };
        let quantity = self.sizer.size(cash, entry);
        debug!(
            symbol = %bar.symbol,
            index,
            entry,
            stop,
            target,
            qty = quantity,
            sizer = self.sizer.name(),
            "bullish crossover"
        );
        Some(OrderIntent::bracket_entry(quantity, stop, target))
    }

    /// Record the id the broker assigned to the intent returned by `on_bar`.
    pub fn order_submitted(&mut self, id: OrderId) {
        self.state = match self.state {
            StrategyState::Flat { .. } => StrategyState::Flat { pending: Some(id) },
            StrategyState::InPosition { bars_held, .. } => StrategyState::InPosition {
                bars_held,
                pending: Some(id),
            },
        };
    }
}

impl std::fmt::Debug for StrategyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyEngine")
            .field("params", &self.params)
            .field("sizer", &self.sizer.name())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fill, OrderSide};
    use crate::indicators::make_bars;
    use crate::sizers::PercentRiskSizer;

    fn v_shape() -> Vec<Bar> {
        let mut closes: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        closes.extend((1..=10).map(|i| 91.0 + 2.0 * i as f64));
        make_bars(&closes)
    }

    fn params() -> StrategyParams {
        StrategyParams {
            fast_period: 3,
            slow_period: 5,
            atr_period: 4,
            ..Default::default()
        }
    }

    fn engine(bars: &[Bar], params: StrategyParams) -> StrategyEngine {
        StrategyEngine::new(params, Box::new(PercentRiskSizer::new(0.01, 1)), bars).unwrap()
    }

    fn fill_event(id: OrderId, role: OrderRole, bar: &Bar) -> OrderEvent {
        OrderEvent::Filled {
            order_id: id,
            role,
            fill: Fill {
                order_id: id,
                bar_index: 0,
                timestamp: bar.timestamp,
                symbol: bar.symbol.clone(),
                side: OrderSide::Buy,
                price: bar.open,
                reference_price: bar.open,
                quantity: 10,
                commission: 0.0,
            },
        }
    }

    fn first_signal(engine: &mut StrategyEngine, bars: &[Bar]) -> Option<(usize, OrderIntent)> {
        bars.iter()
            .enumerate()
            .find_map(|(i, bar)| engine.on_bar(i, bar, 100_000.0, 0).map(|intent| (i, intent)))
    }

    #[test]
    fn invalid_params_fail_construction() {
        let bars = v_shape();
        let bad = StrategyParams {
            fast_period: 0,
            ..params()
        };
        assert!(StrategyEngine::new(bad, Box::new(PercentRiskSizer::new(0.01, 1)), &bars).is_err());
    }

    #[test]
    fn emits_bracket_on_crossover() {
        let bars = v_shape();
        let mut eng = engine(&bars, params());
        let (index, intent) = first_signal(&mut eng, &bars).unwrap();
        assert_eq!(index, 11);
        let atr = eng.indicators().atr(index).unwrap();
        let close = bars[index].close;
        assert!((intent.stop_price.unwrap() - (close - 2.0 * atr)).abs() < 1e-9);
        assert!((intent.limit_price.unwrap() - (close + 3.0 * atr)).abs() < 1e-9);
        assert_eq!(intent.quantity, (100_000.0 * 0.01 / close).floor() as u64);
    }

    #[test]
    fn pending_entry_blocks_new_signals() {
        let bars = v_shape();
        let mut eng = engine(&bars, params());
        let (index, _) = first_signal(&mut eng, &bars).unwrap();
        eng.order_submitted(OrderId(1));
        assert_eq!(eng.state(), StrategyState::Flat { pending: Some(OrderId(1)) });
        for (i, bar) in bars.iter().enumerate().skip(index) {
            assert!(eng.on_bar(i, bar, 100_000.0, 0).is_none());
        }
    }

    #[test]
    fn entry_fill_moves_to_in_position() {
        let bars = v_shape();
        let mut eng = engine(&bars, params());
        first_signal(&mut eng, &bars).unwrap();
        eng.order_submitted(OrderId(1));
        eng.on_order_events(&[fill_event(OrderId(1), OrderRole::Entry, &bars[12])]);
        assert_eq!(
            eng.state(),
            StrategyState::InPosition {
                bars_held: 0,
                pending: None
            }
        );
    }

    #[test]
    fn rejected_entry_returns_to_flat() {
        let bars = v_shape();
        let mut eng = engine(&bars, params());
        eng.order_submitted(OrderId(7));
        eng.on_order_events(&[OrderEvent::Rejected {
            order_id: OrderId(7),
            role: OrderRole::Entry,
            reason: "insufficient cash".into(),
        }]);
        assert_eq!(eng.state(), StrategyState::Flat { pending: None });
    }

    #[test]
    fn time_stop_fires_after_max_bars() {
        let bars = v_shape();
        let mut eng = engine(
            &bars,
            StrategyParams {
                max_bars_held: Some(2),
                ..params()
            },
        );
        eng.order_submitted(OrderId(1));
        eng.on_order_events(&[fill_event(OrderId(1), OrderRole::Entry, &bars[12])]);

        assert!(eng.on_bar(12, &bars[12], 0.0, 10).is_none());
        let intent = eng.on_bar(13, &bars[13], 0.0, 10).unwrap();
        assert_eq!(intent, OrderIntent::close_at_market(10));
        eng.order_submitted(OrderId(4));
        assert!(eng.on_bar(14, &bars[14], 0.0, 10).is_none());

        eng.on_order_events(&[fill_event(OrderId(4), OrderRole::Close, &bars[15])]);
        assert!(eng.state().is_flat());
    }

    #[test]
    fn stop_fill_returns_to_flat() {
        let bars = v_shape();
        let mut eng = engine(&bars, params());
        eng.order_submitted(OrderId(1));
        eng.on_order_events(&[
            fill_event(OrderId(1), OrderRole::Entry, &bars[12]),
            fill_event(OrderId(2), OrderRole::StopLoss, &bars[12]),
        ]);
        assert_eq!(eng.state(), StrategyState::Flat { pending: None });
    }

    #[test]
    fn no_action_during_warmup() {
        let bars = v_shape();
        let mut eng = engine(&bars, params());
        let warmup = eng.indicators().warmup();
        for (i, bar) in bars.iter().enumerate().take(warmup) {
            assert!(eng.on_bar(i, bar, 100_000.0, 0).is_none());
        }
    }
}
