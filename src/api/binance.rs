use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::Exchange;
use crate::models::{Candle, Side};

const RATE_LIMIT_RPM: u32 = 600;
const KLINES_ENDPOINT: &str = "/api/v3/klines";
const ORDER_ENDPOINT: &str = "/api/v3/order";

type HmacSha256 = Hmac<Sha256>;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Binance API error (code {code}): {msg}")]
    Api { code: i64, msg: String },
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("request signing failed: {0}")]
    Signing(String),
}

/// Error body returned by Binance on non-2xx responses
#[derive(Debug, Deserialize)]
struct BinanceContentError {
    code: i64,
    msg: String,
}

/// Response from POST /api/v3/order with newOrderRespType=FULL
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    #[serde(default)]
    fills: Vec<OrderFill>,
    #[serde(default)]
    executed_qty: Option<String>,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderFill {
    price: String,
}

impl OrderResponse {
    /// Realized fill price: first fill, else average from executed totals
    fn fill_price(&self) -> Result<f64, ExchangeError> {
        if let Some(fill) = self.fills.first() {
            return parse_decimal(&fill.price, "fill price");
        }

        let executed = parse_decimal(self.executed_qty.as_deref().unwrap_or("0"), "executedQty")?;
        let quote = parse_decimal(
            self.cummulative_quote_qty.as_deref().unwrap_or("0"),
            "cummulativeQuoteQty",
        )?;
        if executed > 0.0 {
            Ok(quote / executed)
        } else {
            Err(ExchangeError::Decode("market order reported no fills".to_string()))
        }
    }
}

/// Binance Spot REST client
///
/// Cloneable; clones share the HTTP connection pool and rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        api_secret: String,
        recv_window_ms: u64,
        timeout: Duration,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder().timeout(timeout).build()?;

        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            recv_window_ms,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Sign a query string using HMAC-SHA256
    fn sign(&self, query_string: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(query_string.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_query_string(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(ExchangeError::from);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<BinanceContentError>(&body) {
            Ok(err) => Err(ExchangeError::Api {
                code: err.code,
                msg: err.msg,
            }),
            Err(_) => Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }

    async fn signed_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let query_string = Self::build_query_string(&params);
        let signature = self.sign(&query_string)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, endpoint, query_string, signature
        );

        let request = self.client.post(url).header("X-MBX-APIKEY", &self.api_key);
        self.send(request).await
    }

    fn client_order_id() -> String {
        format!("bb-{}", Uuid::new_v4().simple())
    }

    async fn market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<f64, ExchangeError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
            ("newOrderRespType", "FULL".to_string()),
            ("newClientOrderId", Self::client_order_id()),
        ];

        let response: OrderResponse = self.signed_post(ORDER_ENDPOINT, params).await?;
        let price = response.fill_price()?;

        tracing::info!(
            symbol = %symbol,
            side = side.as_str(),
            quantity,
            price,
            "Market order filled"
        );
        Ok(price)
    }

    async fn limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> Result<(), ExchangeError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", quantity.to_string()),
            ("price", price.to_string()),
            ("newClientOrderId", Self::client_order_id()),
        ];

        let _: Value = self.signed_post(ORDER_ENDPOINT, params).await?;
        tracing::info!(
            symbol = %symbol,
            side = side.as_str(),
            quantity,
            price,
            "Limit order placed"
        );
        Ok(())
    }
}

fn parse_decimal(raw: &str, field: &str) -> Result<f64, ExchangeError> {
    raw.parse::<f64>()
        .map_err(|e| ExchangeError::Decode(format!("{field} '{raw}': {e}")))
}

/// Parse one kline row: [openTime, open, high, low, close, volume, closeTime, ...]
fn parse_kline(row: &[Value]) -> Result<Candle, ExchangeError> {
    if row.len() < 5 {
        return Err(ExchangeError::Decode(format!(
            "kline row has {} fields, expected at least 5",
            row.len()
        )));
    }

    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| ExchangeError::Decode("kline open time is not an integer".to_string()))?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(open_time)
        .ok_or_else(|| ExchangeError::Decode(format!("kline open time {open_time} out of range")))?;

    let field = |idx: usize, name: &str| -> Result<f64, ExchangeError> {
        match &row[idx] {
            Value::String(s) => parse_decimal(s, name),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ExchangeError::Decode(format!("{name} is not a number"))),
            other => Err(ExchangeError::Decode(format!("{name} has unexpected type: {other}"))),
        }
    };

    Ok(Candle {
        timestamp,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
    })
}

impl Exchange for BinanceClient {
    async fn fetch_recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!("{}{}", self.base_url, KLINES_ENDPOINT);
        let request = self.client.get(url).query(&[
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ]);

        let rows: Vec<Vec<Value>> = self.send(request).await?;
        let candles = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            symbol = %symbol,
            interval = %interval,
            count = candles.len(),
            "Fetched klines"
        );
        Ok(candles)
    }

    async fn market_buy(&self, symbol: &str, quantity: f64) -> Result<f64, ExchangeError> {
        self.market_order(symbol, Side::Buy, quantity).await
    }

    async fn market_sell(&self, symbol: &str, quantity: f64) -> Result<f64, ExchangeError> {
        self.market_order(symbol, Side::Sell, quantity).await
    }

    async fn limit_sell(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
    ) -> Result<(), ExchangeError> {
        self.limit_order(symbol, Side::Sell, quantity, price).await
    }

    async fn limit_buy(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
    ) -> Result<(), ExchangeError> {
        self.limit_order(symbol, Side::Buy, quantity, price).await
    }

    async fn stop_market_order(
        &self,
        symbol: &str,
        side: Side,
        stop_price: f64,
        quantity: f64,
    ) -> Result<(), ExchangeError> {
        // Spot's stop-triggered market order type is STOP_LOSS
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "STOP_LOSS".to_string()),
            ("quantity", quantity.to_string()),
            ("stopPrice", stop_price.to_string()),
            ("newClientOrderId", Self::client_order_id()),
        ];

        let _: Value = self.signed_post(ORDER_ENDPOINT, params).await?;
        tracing::info!(
            symbol = %symbol,
            side = side.as_str(),
            quantity,
            stop_price,
            "Stop order placed"
        );
        Ok(())
    }
}
