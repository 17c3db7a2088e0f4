use super::Strategy;
use crate::error::BotError;
use crate::indicators::calculate_atr_series;
use crate::models::{Candle, Signal};
use crate::Result;

/// Configuration for the volatility-filtered range breakout
#[derive(Debug, Clone)]
pub struct BreakoutConfig {
    pub atr_period: usize,
    pub lookback_window: usize,
    pub risk_reward_ratio: f64,
    /// Measure the range over the candles before the latest one instead of
    /// including it. Off by default: with the latest candle inside its own
    /// window the close can never strictly exceed the range.
    pub range_excludes_latest: bool,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            lookback_window: 20,
            risk_reward_ratio: 2.0,
            range_excludes_latest: false,
        }
    }
}

/// Classify the latest candle as buy, sell or hold
///
/// `atr` must be aligned with `candles` (see [`calculate_atr_series`]).
/// A breakout is only trusted when ATR is below half of the close range.
pub fn detect_breakout(candles: &[Candle], atr: &[Option<f64>], config: &BreakoutConfig) -> Signal {
    let Some(latest) = candles.last() else {
        return Signal::hold();
    };
    let Some(current_atr) = atr.get(candles.len() - 1).copied().flatten() else {
        return Signal::hold();
    };

    let window_end = if config.range_excludes_latest {
        candles.len() - 1
    } else {
        candles.len()
    };
    let window_start = window_end.saturating_sub(config.lookback_window);
    let window = &candles[window_start..window_end];
    if window.is_empty() {
        return Signal::hold();
    }

    let range_max = window.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
    let range_min = window.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);
    let range_diff = range_max - range_min;

    if !(current_atr < range_diff * 0.5) {
        tracing::debug!(
            atr = current_atr,
            range_diff,
            "Range too volatile for a breakout"
        );
        return Signal::hold();
    }

    if latest.close > range_max {
        let take_profit = latest.close + (latest.close - range_min) * config.risk_reward_ratio;
        Signal::buy(range_min, take_profit)
    } else if latest.close < range_min {
        let take_profit = latest.close - (range_max - latest.close) * config.risk_reward_ratio;
        Signal::sell(range_max, take_profit)
    } else {
        Signal::hold()
    }
}

/// ATR-filtered range breakout strategy
#[derive(Debug, Clone, Default)]
pub struct BreakoutStrategy {
    config: BreakoutConfig,
}

impl BreakoutStrategy {
    pub fn new(config: BreakoutConfig) -> Self {
        Self { config }
    }
}

impl Strategy for BreakoutStrategy {
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal> {
        if candles.len() < self.min_candles_required() {
            return Err(BotError::MarketData(format!(
                "insufficient candles: {} candles, need {}",
                candles.len(),
                self.min_candles_required()
            )));
        }

        let atr = calculate_atr_series(candles, self.config.atr_period);
        Ok(detect_breakout(candles, &atr, &self.config))
    }

    fn name(&self) -> &str {
        "ATR Range Breakout"
    }

    fn min_candles_required(&self) -> usize {
        self.config.atr_period.max(self.config.lookback_window) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalKind;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::{any, prop_assert_eq, proptest};
    use proptest::strategy::Strategy as _;

    fn candle(i: usize, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
            high,
            low,
            close,
        }
    }

    fn candles_from_closes(closes: &[f64], half_spread: f64) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| candle(i, c + half_spread, c - half_spread, c))
            .collect()
    }

    fn config(range_excludes_latest: bool) -> BreakoutConfig {
        BreakoutConfig {
            atr_period: 3,
            lookback_window: 5,
            risk_reward_ratio: 2.0,
            range_excludes_latest,
        }
    }

    #[test]
    fn test_inclusive_window_does_not_fire_on_new_high() {
        // Slow grind up: the latest close is the maximum of its own window
        let closes = [100.0, 100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let candles = candles_from_closes(&closes, 0.2);
        let atr = calculate_atr_series(&candles, 3);

        let signal = detect_breakout(&candles, &atr, &config(false));
        assert_eq!(signal, Signal::hold());
    }

    #[test]
    fn test_excluding_latest_fires_buy() {
        let closes = [100.0, 100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let candles = candles_from_closes(&closes, 0.2);
        let atr = calculate_atr_series(&candles, 3);

        // Window = [100, 101, 102, 103, 104], ATR = 1.2 < 0.5 * 4
        let signal = detect_breakout(&candles, &atr, &config(true));
        assert_eq!(signal.kind, SignalKind::Buy);
        assert_eq!(signal.stop_loss, 100.0);
        assert_eq!(signal.take_profit, 105.0 + (105.0 - 100.0) * 2.0);
    }

    #[test]
    fn test_excluding_latest_fires_sell() {
        let closes = [105.0, 105.0, 104.0, 103.0, 102.0, 101.0, 100.0];
        let candles = candles_from_closes(&closes, 0.2);
        let atr = calculate_atr_series(&candles, 3);

        // Window = [105, 104, 103, 102, 101], ATR = 1.2 < 0.5 * 4
        let signal = detect_breakout(&candles, &atr, &config(true));
        assert_eq!(signal.kind, SignalKind::Sell);
        assert_eq!(signal.stop_loss, 105.0);
        assert_eq!(signal.take_profit, 100.0 - (105.0 - 100.0) * 2.0);
        assert!(signal.stop_loss > candles.last().unwrap().close);
    }

    #[test]
    fn test_volatile_range_is_filtered() {
        // Wide candles: ATR dwarfs the close range
        let closes = [100.0, 100.0, 101.0, 102.0, 103.0, 104.0, 110.0];
        let candles = candles_from_closes(&closes, 10.0);
        let atr = calculate_atr_series(&candles, 3);

        let signal = detect_breakout(&candles, &atr, &config(true));
        assert_eq!(signal, Signal::hold());
    }

    #[test]
    fn test_undefined_atr_holds() {
        let candles = candles_from_closes(&[100.0, 105.0], 0.1);
        let atr = calculate_atr_series(&candles, 3);
        assert_eq!(detect_breakout(&candles, &atr, &config(true)), Signal::hold());
        assert_eq!(detect_breakout(&[], &[], &config(true)), Signal::hold());
    }

    #[test]
    fn test_strategy_rejects_short_series() {
        let strategy = BreakoutStrategy::new(config(false));
        assert_eq!(strategy.min_candles_required(), 6);

        let candles = candles_from_closes(&[100.0; 5], 0.5);
        let err = strategy.generate_signal(&candles).unwrap_err();
        assert!(matches!(err, BotError::MarketData(_)));
        assert!(err.to_string().contains("insufficient candles"));
    }

    #[test]
    fn test_strategy_flat_market_holds() {
        let strategy = BreakoutStrategy::new(config(false));
        let candles = candles_from_closes(&[100.0; 20], 0.5);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::hold());
    }

    fn arb_candles() -> impl proptest::strategy::Strategy<Value = Vec<Candle>> {
        let row = (1.0f64..1000.0, 0.0f64..50.0, 0.0f64..1.0);
        proptest::collection::vec(row, 2..40).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (close, spread, skew))| {
                    candle(i, close + spread * skew, close - spread * (1.0 - skew), close)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_volatile_range_always_holds(
            candles in arb_candles(),
            atr_period in 1usize..10,
            lookback_window in 1usize..10,
            excludes in any::<bool>(),
        ) {
            let cfg = BreakoutConfig {
                atr_period,
                lookback_window,
                risk_reward_ratio: 2.0,
                range_excludes_latest: excludes,
            };
            let atr = calculate_atr_series(&candles, atr_period);
            let end = if excludes { candles.len() - 1 } else { candles.len() };
            let window = &candles[end.saturating_sub(lookback_window)..end];
            let max = window.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
            let min = window.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);

            let filtered = match atr[candles.len() - 1] {
                Some(current) => current >= 0.5 * (max - min),
                None => true,
            };
            if filtered {
                prop_assert_eq!(detect_breakout(&candles, &atr, &cfg), Signal::hold());
            }
        }

        #[test]
        fn prop_inclusive_window_never_fires(
            candles in arb_candles(),
            atr_period in 1usize..10,
            lookback_window in 1usize..10,
        ) {
            let cfg = BreakoutConfig {
                atr_period,
                lookback_window,
                risk_reward_ratio: 2.0,
                range_excludes_latest: false,
            };
            let atr = calculate_atr_series(&candles, atr_period);
            prop_assert_eq!(detect_breakout(&candles, &atr, &cfg).kind, SignalKind::Hold);
        }
    }
}
