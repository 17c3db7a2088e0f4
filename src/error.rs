use thiserror::Error;

/// Failure taxonomy for the trading loop.
///
/// Only `ConfigValidation` is fatal, and only at startup. Every other variant is
/// caught at the cycle boundary by the scheduler.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("market data error: {0}")]
    MarketData(String),

    #[error("order placement failed: {0}")]
    OrderPlacement(String),

    #[error("notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("ledger I/O error: {0}")]
    LedgerIo(#[from] std::io::Error),

    #[error("ledger format error: {0}")]
    LedgerFormat(#[from] csv::Error),
}

impl From<::config::ConfigError> for BotError {
    fn from(err: ::config::ConfigError) -> Self {
        BotError::ConfigValidation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
