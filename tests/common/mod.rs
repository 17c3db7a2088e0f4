#![allow(dead_code)]

use breakoutbot::api::{Exchange, ExchangeError};
use breakoutbot::notify::Notifier;
use breakoutbot::{Candle, Side};
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

/// In-memory exchange with scripted candles and optional failures
#[derive(Default)]
pub struct FakeExchange {
    pub candles: Vec<Candle>,
    pub fill_price: f64,
    pub fail_fetch: bool,
    /// Fetches that fail before the exchange recovers
    pub fetch_failures: AtomicUsize,
    pub fail_on: Option<&'static str>,
    calls: Mutex<Vec<String>>,
    fetched_at: Mutex<Vec<Instant>>,
}

impl FakeExchange {
    pub fn with_candles(candles: Vec<Candle>, fill_price: f64) -> Self {
        Self {
            candles,
            fill_price,
            ..Default::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched_at.lock().unwrap().len()
    }

    /// Gaps between consecutive candle fetches
    pub fn fetch_gaps(&self) -> Vec<std::time::Duration> {
        let times = self.fetched_at.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, detail: String) -> Result<(), ExchangeError> {
        self.calls.lock().unwrap().push(format!("{op} {detail}"));
        if self.fail_on == Some(op) {
            return Err(ExchangeError::Api {
                code: -2010,
                msg: "Account has insufficient balance for requested action.".to_string(),
            });
        }
        Ok(())
    }
}

impl Exchange for FakeExchange {
    async fn fetch_recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("klines {symbol} {interval} {limit}"));
        self.fetched_at.lock().unwrap().push(Instant::now());

        let recovering = self
            .fetch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.fail_fetch || recovering {
            return Err(ExchangeError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        let skip = self.candles.len().saturating_sub(limit as usize);
        Ok(self.candles[skip..].to_vec())
    }

    async fn market_buy(&self, _symbol: &str, quantity: f64) -> Result<f64, ExchangeError> {
        self.record("market_buy", format!("{quantity}"))?;
        Ok(self.fill_price)
    }

    async fn market_sell(&self, _symbol: &str, quantity: f64) -> Result<f64, ExchangeError> {
        self.record("market_sell", format!("{quantity}"))?;
        Ok(self.fill_price)
    }

    async fn limit_sell(
        &self,
        _symbol: &str,
        quantity: f64,
        price: f64,
    ) -> Result<(), ExchangeError> {
        self.record("limit_sell", format!("{quantity} @ {price}"))
    }

    async fn limit_buy(
        &self,
        _symbol: &str,
        quantity: f64,
        price: f64,
    ) -> Result<(), ExchangeError> {
        self.record("limit_buy", format!("{quantity} @ {price}"))
    }

    async fn stop_market_order(
        &self,
        _symbol: &str,
        side: Side,
        stop_price: f64,
        quantity: f64,
    ) -> Result<(), ExchangeError> {
        self.record("stop", format!("{} {quantity} @ {stop_price}", side.as_str()))
    }
}

/// Captures every (subject, body) pair it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str) -> breakoutbot::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub fn candle(i: usize, close: f64, half_spread: f64) -> Candle {
    Candle {
        timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
        high: close + half_spread,
        low: close - half_spread,
        close,
    }
}

/// 15 flat candles at 100, then a steady climb to 105
///
/// With ATR(3) and a 5-candle range that excludes the latest candle this is a
/// clean buy breakout: range [100, 104], ATR 1.2, close 105.
pub fn upside_breakout() -> Vec<Candle> {
    let mut closes = vec![100.0; 15];
    closes.extend([101.0, 102.0, 103.0, 104.0, 105.0]);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle(i, c, 0.2))
        .collect()
}

/// Mirror image of [`upside_breakout`]
pub fn downside_breakout() -> Vec<Candle> {
    let mut closes = vec![100.0; 15];
    closes.extend([99.0, 98.0, 97.0, 96.0, 95.0]);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle(i, c, 0.2))
        .collect()
}
