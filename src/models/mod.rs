use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLC candle as used by the breakout engine (open/volume are not needed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Direction of a breakout signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Buy,
    Sell,
    #[serde(rename = "none")]
    Hold,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Buy => "buy",
            SignalKind::Sell => "sell",
            SignalKind::Hold => "none",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading signal with its protective bracket levels
///
/// Levels are zero when `kind` is `Hold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Signal {
    pub fn hold() -> Self {
        Self {
            kind: SignalKind::Hold,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }

    pub fn buy(stop_loss: f64, take_profit: f64) -> Self {
        Self {
            kind: SignalKind::Buy,
            stop_loss,
            take_profit,
        }
    }

    pub fn sell(stop_loss: f64, take_profit: f64) -> Self {
        Self {
            kind: SignalKind::Sell,
            stop_loss,
            take_profit,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.kind != SignalKind::Hold
    }
}

/// Order side on the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Lifecycle state of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Open,
    Win,
    Loss,
}

impl TradeResult {
    pub fn is_closed(&self) -> bool {
        matches!(self, TradeResult::Win | TradeResult::Loss)
    }
}

/// One row of the trade ledger
///
/// Field order is the column order on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub signal: SignalKind,
    #[serde(rename = "price")]
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub outcome: String,
    pub result: TradeResult,
    pub pnl: f64,
}

impl TradeRecord {
    pub const OUTCOME_BRACKET_PLACED: &'static str = "bracket_placed";

    /// Record for a freshly executed entry; result stays `open` for good
    pub fn opened(timestamp: DateTime<Utc>, signal: &Signal, entry_price: f64) -> Self {
        Self {
            timestamp,
            signal: signal.kind,
            entry_price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            outcome: Self::OUTCOME_BRACKET_PLACED.to_string(),
            result: TradeResult::Open,
            pnl: 0.0,
        }
    }
}
