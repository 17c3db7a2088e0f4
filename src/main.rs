use anyhow::Context;
use breakoutbot::api::BinanceClient;
use breakoutbot::config::{load_settings, Settings};
use breakoutbot::execution::OrderExecutor;
use breakoutbot::notify::{notify_best_effort, NotifierKind};
use breakoutbot::persistence::TradeLedger;
use breakoutbot::scheduler::{MarketParams, Scheduler};
use breakoutbot::strategy::breakout::BreakoutStrategy;
use breakoutbot::BotError;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let config_path =
        std::env::var("BREAKOUTBOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let settings = match load_settings(&config_path) {
        Ok(settings) => settings,
        Err(BotError::ConfigValidation(reason)) => {
            tracing::error!("❌ Invalid configuration in {}:", config_path);
            for problem in reason.split("; ") {
                tracing::error!(" - {}", problem);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("failed to load configuration"),
    };

    // Restore before anything else touches the ledger
    let ledger = TradeLedger::open(&settings.ledger.path, &settings.ledger.backup_path)
        .context("failed to open trade ledger")?;

    let exchange = Arc::new(
        BinanceClient::new(
            settings.exchange_url(),
            settings.binance.api_key.clone(),
            settings.binance.api_secret.clone(),
            settings.binance.recv_window_ms,
            settings.http_timeout(),
        )
        .context("failed to build Binance client")?,
    );
    let notifier = Arc::new(
        NotifierKind::from_settings(&settings.notifications, settings.http_timeout())
            .context("failed to build notifier")?,
    );

    log_configuration(&settings);
    tracing::info!("  Notifications: {}", notifier.channel());

    let executor = OrderExecutor::new(
        exchange.clone(),
        notifier.clone(),
        settings.trading.symbol.clone(),
        settings.trading.quantity,
        settings.trading.price_decimals,
    );
    let scheduler = Scheduler::new(
        exchange,
        notifier.clone(),
        executor,
        BreakoutStrategy::new(settings.breakout_config()),
        ledger,
        MarketParams {
            symbol: settings.trading.symbol.clone(),
            interval: settings.trading.interval.clone(),
            candle_limit: settings.trading.candle_limit,
        },
        settings.poll_interval(),
    );

    notify_best_effort(
        notifier.as_ref(),
        "Bot Started",
        &format!(
            "Mode: {} | Symbol: {} | Interval: {}",
            mode_label(&settings),
            settings.trading.symbol,
            settings.trading.interval
        ),
    )
    .await;

    scheduler.run().await;

    tracing::info!("👋 BreakoutBot stopped");
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("breakoutbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn mode_label(settings: &Settings) -> &'static str {
    if settings.is_paper() {
        "PAPER"
    } else {
        "LIVE"
    }
}

fn log_configuration(settings: &Settings) {
    let t = &settings.trading;
    tracing::info!(
        "🚀 [STARTING BOT] Mode: {} | Symbol: {} | Interval: {}",
        mode_label(settings),
        t.symbol,
        t.interval
    );
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Exchange: {}", settings.exchange_url());
    tracing::info!("  Quantity: {}", t.quantity);
    tracing::info!("  ATR Period: {}", t.atr_period);
    tracing::info!("  Breakout Lookback: {}", t.breakout_lookback);
    tracing::info!("  Risk/Reward: {}", t.risk_reward_ratio);
    tracing::info!("  Check Every: {} min", t.signal_check_interval_minutes);
    tracing::info!("  Ledger: {}", settings.ledger.path.display());
    if t.range_excludes_latest {
        tracing::info!("  Breakout range excludes the latest candle");
    }
}
