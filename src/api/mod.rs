pub mod binance;

pub use binance::{BinanceClient, ExchangeError};

use crate::models::{Candle, Side};

/// Exchange capabilities the bot consumes
///
/// Implemented by [`BinanceClient`]; tests substitute in-memory fakes.
#[allow(async_fn_in_trait)]
pub trait Exchange {
    /// Most recent `limit` candles, oldest first
    async fn fetch_recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Market buy; returns the realized fill price
    async fn market_buy(&self, symbol: &str, quantity: f64) -> Result<f64, ExchangeError>;

    /// Market sell; returns the realized fill price
    async fn market_sell(&self, symbol: &str, quantity: f64) -> Result<f64, ExchangeError>;

    /// Resting limit sell (take-profit for a long)
    async fn limit_sell(&self, symbol: &str, quantity: f64, price: f64)
        -> Result<(), ExchangeError>;

    /// Resting limit buy (take-profit for a short)
    async fn limit_buy(&self, symbol: &str, quantity: f64, price: f64)
        -> Result<(), ExchangeError>;

    /// Stop-triggered market order
    async fn stop_market_order(
        &self,
        symbol: &str,
        side: Side,
        stop_price: f64,
        quantity: f64,
    ) -> Result<(), ExchangeError>;
}
