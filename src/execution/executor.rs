use std::sync::Arc;

use crate::api::{Exchange, ExchangeError};
use crate::error::BotError;
use crate::models::{Side, Signal, SignalKind};
use crate::notify::{notify_best_effort, Notifier};
use crate::Result;

/// Successful entry with its bracket in place
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub signal: Signal,
    pub entry_price: f64,
}

/// Round a price to the exchange's tick precision
pub fn round_price(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Rounded levels must be positive, finite and keep the stop on the losing side
fn bracket_levels_valid(
    entry_side: Side,
    take_profit: f64,
    stop_loss: f64,
) -> std::result::Result<(), String> {
    let usable = |p: f64| p.is_finite() && p > 0.0;
    if !usable(take_profit) || !usable(stop_loss) {
        return Err(format!(
            "bracket levels not placeable after rounding: TP {take_profit}, SL {stop_loss}"
        ));
    }

    let ordered = match entry_side {
        Side::Buy => stop_loss < take_profit,
        Side::Sell => stop_loss > take_profit,
    };
    if !ordered {
        return Err(format!(
            "bracket levels collapse or cross after rounding: TP {take_profit}, SL {stop_loss}"
        ));
    }
    Ok(())
}

/// Places the entry market order and its take-profit/stop-loss bracket
///
/// Any failing leg fails the whole attempt. Legs already placed are left as they are.
pub struct OrderExecutor<E, N> {
    exchange: Arc<E>,
    notifier: Arc<N>,
    symbol: String,
    quantity: f64,
    price_decimals: u32,
}

impl<E: Exchange, N: Notifier> OrderExecutor<E, N> {
    pub fn new(
        exchange: Arc<E>,
        notifier: Arc<N>,
        symbol: impl Into<String>,
        quantity: f64,
        price_decimals: u32,
    ) -> Self {
        Self {
            exchange,
            notifier,
            symbol: symbol.into(),
            quantity,
            price_decimals,
        }
    }

    /// Execute a buy or sell signal
    pub async fn execute(&self, signal: &Signal) -> Result<Execution> {
        let entry_side = match signal.kind {
            SignalKind::Buy => Side::Buy,
            SignalKind::Sell => Side::Sell,
            SignalKind::Hold => {
                return Err(BotError::OrderPlacement(
                    "hold signal is not executable".to_string(),
                ))
            }
        };

        let take_profit = round_price(signal.take_profit, self.price_decimals);
        let stop_loss = round_price(signal.stop_loss, self.price_decimals);

        // Nothing is sent while the rounded bracket is unusable
        if let Err(reason) = bracket_levels_valid(entry_side, take_profit, stop_loss) {
            tracing::error!(
                symbol = %self.symbol,
                signal = %signal.kind,
                "[ORDER ERROR] {}",
                reason
            );
            notify_best_effort(self.notifier.as_ref(), "Trade Error", &reason).await;
            return Err(BotError::OrderPlacement(reason));
        }

        match self.place_with_bracket(entry_side, take_profit, stop_loss).await {
            Ok(entry_price) => {
                self.check_levels(entry_side, entry_price, stop_loss);

                let (subject, label) = match entry_side {
                    Side::Buy => ("Buy Executed", "BUY"),
                    Side::Sell => ("Sell Executed", "SELL"),
                };
                let body = format!("{label} @ {entry_price}\nTP: {take_profit}\nSL: {stop_loss}");
                notify_best_effort(self.notifier.as_ref(), subject, &body).await;

                Ok(Execution {
                    signal: Signal {
                        kind: signal.kind,
                        stop_loss,
                        take_profit,
                    },
                    entry_price,
                })
            }
            Err(e) => {
                tracing::error!(
                    symbol = %self.symbol,
                    signal = %signal.kind,
                    "[ORDER ERROR] {}",
                    e
                );
                notify_best_effort(self.notifier.as_ref(), "Trade Error", &e.to_string()).await;
                Err(BotError::OrderPlacement(e.to_string()))
            }
        }
    }

    /// Entry, then take-profit limit, then stop; returns the entry fill price
    async fn place_with_bracket(
        &self,
        entry_side: Side,
        take_profit: f64,
        stop_loss: f64,
    ) -> std::result::Result<f64, ExchangeError> {
        let exchange = self.exchange.as_ref();

        let entry_price = match entry_side {
            Side::Buy => exchange.market_buy(&self.symbol, self.quantity).await?,
            Side::Sell => exchange.market_sell(&self.symbol, self.quantity).await?,
        };

        match entry_side {
            Side::Buy => {
                exchange
                    .limit_sell(&self.symbol, self.quantity, take_profit)
                    .await?
            }
            Side::Sell => {
                exchange
                    .limit_buy(&self.symbol, self.quantity, take_profit)
                    .await?
            }
        }

        exchange
            .stop_market_order(&self.symbol, entry_side.opposite(), stop_loss, self.quantity)
            .await?;

        Ok(entry_price)
    }

    fn check_levels(&self, entry_side: Side, entry_price: f64, stop_loss: f64) {
        let consistent = match entry_side {
            Side::Buy => stop_loss < entry_price,
            Side::Sell => stop_loss > entry_price,
        };
        if !consistent {
            tracing::warn!(
                symbol = %self.symbol,
                entry_price,
                stop_loss,
                "Stop-loss is on the wrong side of the fill price"
            );
        }
    }
}
