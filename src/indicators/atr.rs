/// Average True Range (ATR) indicator
///
/// Measures market volatility by averaging true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The first candle has no previous close, so its true range is just High - Low.
/// The average is a plain rolling mean (not Wilder's smoothing).

use std::collections::VecDeque;

use crate::models::Candle;

/// True range of `candle` given the close of the candle before it
pub fn true_range(candle: &Candle, prev_close: Option<f64>) -> f64 {
    let range = candle.high - candle.low;
    match prev_close {
        Some(prev_close) => range
            .max((candle.high - prev_close).abs())
            .max((candle.low - prev_close).abs()),
        None => range,
    }
}

/// True range for every candle in the series
pub fn true_range_series(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let prev_close = i.checked_sub(1).map(|p| candles[p].close);
            true_range(candle, prev_close)
        })
        .collect()
}

/// Calculate ATR aligned with the input candles
///
/// Returns one entry per candle. The first `period - 1` entries are `None`;
/// every later entry is the mean of the `period` true ranges ending at that candle.
/// A `period` of 0 yields all `None`.
pub fn calculate_atr_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut atr_series = Vec::with_capacity(candles.len());
    if period == 0 {
        atr_series.resize(candles.len(), None);
        return atr_series;
    }

    let mut window: VecDeque<f64> = VecDeque::with_capacity(period);
    let mut sum = 0.0;

    for tr in true_range_series(candles) {
        window.push_back(tr);
        sum += tr;
        if window.len() > period {
            if let Some(dropped) = window.pop_front() {
                sum -= dropped;
            }
        }

        if window.len() == period {
            atr_series.push(Some(sum / period as f64));
        } else {
            atr_series.push(None);
        }
    }

    atr_series
}

/// Current ATR (at the latest candle), or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    calculate_atr_series(candles, period).last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn create_test_candles(prices: &[(f64, f64, f64)]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Candle {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                high,
                low,
                close,
            })
            .collect()
    }

    #[test]
    fn test_hand_computed_atr() {
        // highs [10, 11, 9], lows [8, 9, 7], closes [9, 10, 8]
        // TR = [2, max(2, 2, 0) = 2, max(2, 1, 3) = 3]
        let candles = create_test_candles(&[(10.0, 8.0, 9.0), (11.0, 9.0, 10.0), (9.0, 7.0, 8.0)]);

        assert_eq!(true_range_series(&candles), vec![2.0, 2.0, 3.0]);

        let atr = calculate_atr_series(&candles, 2);
        assert_eq!(atr, vec![None, Some(2.0), Some(2.5)]);
        assert_eq!(calculate_atr(&candles, 2), Some(2.5));
    }

    #[test]
    fn test_leading_undefined_entries() {
        let candles = create_test_candles(&[(101.0, 99.0, 100.0); 10]);

        for period in 1..=12 {
            let atr = calculate_atr_series(&candles, period);
            assert_eq!(atr.len(), candles.len());

            let leading_none = atr.iter().take_while(|v| v.is_none()).count();
            assert_eq!(leading_none, (period - 1).min(candles.len()));
            assert!(atr.iter().skip(leading_none).all(|v| v.is_some()));
        }
    }

    #[test]
    fn test_rolling_mean_matches_direct_mean() {
        let candles = create_test_candles(&[
            (105.0, 95.0, 102.0),
            (110.0, 98.0, 105.0),
            (108.0, 92.0, 95.0),
            (103.0, 88.0, 100.0),
            (115.0, 97.0, 110.0),
            (112.0, 95.0, 98.0),
            (108.0, 90.0, 105.0),
        ]);
        let period = 3;
        let trs = true_range_series(&candles);
        let atr = calculate_atr_series(&candles, period);

        for i in (period - 1)..candles.len() {
            let expected = trs[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
            let actual = atr[i].unwrap();
            assert!((actual - expected).abs() < 1e-9, "index {}: {} vs {}", i, actual, expected);
        }
    }

    #[test]
    fn test_gap_uses_previous_close() {
        // Gap up: range is 1 but distance from previous close is 10
        let candles = create_test_candles(&[(101.0, 99.0, 100.0), (111.0, 110.0, 110.5)]);
        assert_eq!(true_range_series(&candles)[1], 11.0);
    }

    #[test]
    fn test_empty_series() {
        assert!(calculate_atr_series(&[], 14).is_empty());
        assert_eq!(calculate_atr(&[], 14), None);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = create_test_candles(&[(101.0, 99.0, 100.0), (101.0, 99.0, 100.0)]);
        assert_eq!(calculate_atr(&candles, 14), None);
    }
}
