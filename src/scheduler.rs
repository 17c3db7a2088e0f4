use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::api::Exchange;
use crate::error::BotError;
use crate::execution::OrderExecutor;
use crate::models::{Signal, TradeRecord};
use crate::notify::{notify_best_effort, Notifier};
use crate::persistence::TradeLedger;
use crate::strategy::breakout::BreakoutStrategy;
use crate::strategy::Strategy;
use crate::Result;

/// What one polling cycle produced
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    NoSignal,
    Executed(TradeRecord),
}

/// Market the bot polls
#[derive(Debug, Clone)]
pub struct MarketParams {
    pub symbol: String,
    pub interval: String,
    pub candle_limit: u16,
}

/// Fetch → indicate → detect → execute → log, then sleep; forever
///
/// A cycle never takes the loop down: every error is reported and the next
/// tick starts fresh.
pub struct Scheduler<E, N> {
    exchange: Arc<E>,
    notifier: Arc<N>,
    executor: OrderExecutor<E, N>,
    strategy: BreakoutStrategy,
    ledger: TradeLedger,
    market: MarketParams,
    poll_interval: Duration,
}

impl<E: Exchange, N: Notifier> Scheduler<E, N> {
    pub fn new(
        exchange: Arc<E>,
        notifier: Arc<N>,
        executor: OrderExecutor<E, N>,
        strategy: BreakoutStrategy,
        ledger: TradeLedger,
        market: MarketParams,
        poll_interval: Duration,
    ) -> Self {
        Self {
            exchange,
            notifier,
            executor,
            strategy,
            ledger,
            market,
            poll_interval,
        }
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    /// Run a single cycle without sleeping
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let candles = self
            .exchange
            .fetch_recent_candles(
                &self.market.symbol,
                &self.market.interval,
                self.market.candle_limit,
            )
            .await
            .map_err(|e| BotError::MarketData(e.to_string()))?;

        let signal: Signal = self.strategy.generate_signal(&candles)?;
        if !signal.is_actionable() {
            return Ok(CycleOutcome::NoSignal);
        }

        tracing::info!(
            signal = %signal.kind,
            stop_loss = signal.stop_loss,
            take_profit = signal.take_profit,
            "SIGNAL: {}",
            signal.kind.as_str().to_uppercase()
        );

        let execution = self.executor.execute(&signal).await?;
        let record = TradeRecord::opened(Utc::now(), &execution.signal, execution.entry_price);
        self.ledger.append(&record)?;

        Ok(CycleOutcome::Executed(record))
    }

    /// Report a finished cycle; never fails
    pub async fn report(&self, outcome: &Result<CycleOutcome>) {
        match outcome {
            Ok(CycleOutcome::NoSignal) => {
                tracing::info!(symbol = %self.market.symbol, "No Signal");
            }
            Ok(CycleOutcome::Executed(record)) => {
                tracing::info!(
                    symbol = %self.market.symbol,
                    signal = %record.signal,
                    price = record.entry_price,
                    "✓ Trade executed and logged"
                );
            }
            Err(BotError::OrderPlacement(reason)) => {
                // Executor has already sent the trade error notification
                tracing::error!(symbol = %self.market.symbol, "Trade not executed: {}", reason);
            }
            Err(e @ BotError::MarketData(_)) => {
                tracing::warn!(symbol = %self.market.symbol, "[RUNTIME ERROR] {}", e);
                self.notify_runtime_error(e).await;
            }
            Err(e) => {
                tracing::error!(symbol = %self.market.symbol, "[RUNTIME ERROR] {}", e);
                self.notify_runtime_error(e).await;
            }
        }
    }

    async fn notify_runtime_error(&self, error: &BotError) {
        notify_best_effort(self.notifier.as_ref(), "Bot Runtime Error", &error.to_string()).await;
    }

    /// Poll until the process is interrupted (Ctrl+C)
    pub async fn run(&self) {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                // Without a handler the loop can only end with the process
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(ctrl_c).await;
        tracing::info!("⚠️  Received Ctrl+C, shutting down...");
    }

    /// Poll until `shutdown` completes
    ///
    /// Shutdown is only honored between cycles. The same future is polled on
    /// every pass, so a request that lands while a cycle is running is picked up
    /// as soon as that cycle has been reported.
    pub async fn run_until<F: Future>(&self, shutdown: F) {
        tracing::info!(
            symbol = %self.market.symbol,
            interval = %self.market.interval,
            strategy = self.strategy.name(),
            "Polling every {:?}",
            self.poll_interval
        );

        tokio::pin!(shutdown);

        loop {
            let outcome = self.run_cycle().await;
            self.report(&outcome).await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => return,
            }
        }
    }
}
