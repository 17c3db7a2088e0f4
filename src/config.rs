use ::config::{Config, Environment, File, FileFormat};
use lettre::message::Mailbox;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::BotError;
use crate::strategy::breakout::BreakoutConfig;
use crate::Result;

/// Kline intervals accepted by Binance
const VALID_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

const MAX_CANDLE_LIMIT: u16 = 1000;

/// Finest price precision Binance quotes
const MAX_PRICE_DECIMALS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceSettings {
    pub api_key: String,
    pub api_secret: String,
    pub testnet_url: String,
    pub live_url: String,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingSettings {
    pub symbol: String,
    pub quantity: f64,
    pub risk_reward_ratio: f64,
    pub atr_period: usize,
    pub breakout_lookback: usize,
    pub interval: String,
    pub signal_check_interval_minutes: u64,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u16,
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
    #[serde(default)]
    pub range_excludes_latest: bool,
}

/// SMTP delivery; port 465 is implicit TLS, any other port uses STARTTLS
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub from: String,
    pub to: String,
    pub password: String,
    /// Login name, defaults to `from`
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

impl EmailSettings {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.from)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub email: Option<EmailSettings>,
}

impl NotificationSettings {
    /// Webhook URL, ignoring blank values
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            backup_path: default_backup_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Validated, immutable bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub mode: TradingMode,
    pub binance: BinanceSettings,
    pub trading: TradingSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

fn default_recv_window_ms() -> u64 {
    5000
}

fn default_candle_limit() -> u16 {
    100
}

fn default_price_decimals() -> u32 {
    2
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("paper_trades_log.csv")
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("paper_trades_log.bak.csv")
}

fn default_timeout_secs() -> u64 {
    10
}

impl Settings {
    /// Parse settings from YAML text (no environment layering)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every constraint, reporting all violations at once
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let t = &self.trading;

        if self.binance.api_key.trim().is_empty() {
            errors.push("binance.api_key: must not be empty".to_string());
        }
        if self.binance.api_secret.trim().is_empty() {
            errors.push("binance.api_secret: must not be empty".to_string());
        }
        if t.symbol.trim().is_empty() {
            errors.push("trading.symbol: must not be empty".to_string());
        }
        if !(t.quantity >= 0.00001) {
            errors.push(format!("trading.quantity: {} is below 0.00001", t.quantity));
        }
        if !(t.risk_reward_ratio >= 1.0) {
            errors.push(format!(
                "trading.risk_reward_ratio: {} is below 1",
                t.risk_reward_ratio
            ));
        }
        if t.atr_period < 1 {
            errors.push("trading.atr_period: must be at least 1".to_string());
        }
        if t.breakout_lookback < 1 {
            errors.push("trading.breakout_lookback: must be at least 1".to_string());
        }
        if !VALID_INTERVALS.contains(&t.interval.as_str()) {
            errors.push(format!("trading.interval: '{}' is not a kline interval", t.interval));
        }
        if t.signal_check_interval_minutes < 1 {
            errors.push("trading.signal_check_interval_minutes: must be at least 1".to_string());
        }

        let min_candles = t.atr_period.max(t.breakout_lookback) + 1;
        if (t.candle_limit as usize) < min_candles {
            errors.push(format!(
                "trading.candle_limit: {} is below the {} candles the signal needs",
                t.candle_limit, min_candles
            ));
        }
        if t.candle_limit > MAX_CANDLE_LIMIT {
            errors.push(format!(
                "trading.candle_limit: {} exceeds {}",
                t.candle_limit, MAX_CANDLE_LIMIT
            ));
        }
        if t.price_decimals > MAX_PRICE_DECIMALS {
            errors.push(format!(
                "trading.price_decimals: {} exceeds {}",
                t.price_decimals, MAX_PRICE_DECIMALS
            ));
        }

        if let Some(email) = &self.notifications.email {
            if self.notifications.webhook().is_some() {
                errors.push(
                    "notifications: configure either webhook_url or email, not both".to_string(),
                );
            }
            for (field, address) in [("from", &email.from), ("to", &email.to)] {
                if let Err(e) = address.parse::<Mailbox>() {
                    errors.push(format!(
                        "notifications.email.{field}: '{address}' is not a mail address ({e})"
                    ));
                }
            }
            if email.password.is_empty() {
                errors.push("notifications.email.password: must not be empty".to_string());
            }
            if email.smtp_host.trim().is_empty() {
                errors.push("notifications.email.smtp_host: must not be empty".to_string());
            }
        }

        if self.http.timeout_secs == 0 {
            errors.push("http.timeout_secs: must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BotError::ConfigValidation(errors.join("; ")))
        }
    }

    pub fn is_paper(&self) -> bool {
        self.mode == TradingMode::Paper
    }

    /// REST endpoint for the configured mode
    pub fn exchange_url(&self) -> &str {
        match self.mode {
            TradingMode::Paper => &self.binance.testnet_url,
            TradingMode::Live => &self.binance.live_url,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.trading.signal_check_interval_minutes * 60)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn breakout_config(&self) -> BreakoutConfig {
        BreakoutConfig {
            atr_period: self.trading.atr_period,
            lookback_window: self.trading.breakout_lookback,
            risk_reward_ratio: self.trading.risk_reward_ratio,
            range_excludes_latest: self.trading.range_excludes_latest,
        }
    }
}

/// Load settings from a YAML file layered with `BOT__`-prefixed environment variables
///
/// e.g. `BOT__BINANCE__API_SECRET` overrides `binance.api_secret`.
pub fn load_settings(path: &str) -> Result<Settings> {
    let settings: Settings = Config::builder()
        .add_source(File::with_name(path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix("BOT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}
