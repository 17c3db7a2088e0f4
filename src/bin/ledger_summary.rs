use anyhow::Context;
use breakoutbot::persistence::summary::{open_trades, pnl_curve, recent_closed};
use breakoutbot::persistence::{LedgerSummary, TradeLedger};
use clap::Parser;
use std::path::PathBuf;

/// Print performance statistics for a trade ledger
#[derive(Parser)]
#[command(name = "ledger_summary", about = "Summarize the breakout bot's trade ledger")]
struct Args {
    /// Primary ledger CSV
    #[arg(long, default_value = "paper_trades_log.csv")]
    ledger: PathBuf,

    /// Backup copy, promoted if the primary is missing
    #[arg(long, default_value = "paper_trades_log.bak.csv")]
    backup: PathBuf,

    /// How many of the latest closed trades to list
    #[arg(long, default_value_t = 10)]
    recent: usize,

    /// Also print the cumulative pnl curve
    #[arg(long, default_value_t = false)]
    curve: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("breakoutbot=warn")
        .init();

    let args = Args::parse();

    let ledger = TradeLedger::open(&args.ledger, &args.backup)
        .with_context(|| format!("failed to open {}", args.ledger.display()))?;
    let records = ledger
        .read_all()
        .with_context(|| format!("failed to read {}", args.ledger.display()))?;

    println!("\n═══════════════════════════════════════════════════════");
    println!("         TRADE LEDGER: {}", args.ledger.display());
    println!("═══════════════════════════════════════════════════════\n");

    if records.is_empty() {
        println!("No trades logged yet.");
        return Ok(());
    }

    let summary = LedgerSummary::from_records(&records);
    println!("📊 Performance (closed trades)");
    println!("  Total Trades: {}", summary.total);
    println!("  Wins:         {}", summary.wins);
    println!("  Losses:       {}", summary.losses);
    println!("  Win Rate:     {:.2}%", summary.win_rate);
    println!("  Avg PnL:      {:.2}", summary.avg_pnl);
    println!("  Net Profit:   {:.2}", summary.net_profit);

    let open = open_trades(&records);
    println!("\n⏳ Open Trades: {}", open.len());
    for r in &open {
        println!(
            "  {} {:<4} @ {:.2}  SL {:.2}  TP {:.2}",
            r.timestamp.format("%Y-%m-%d %H:%M"),
            r.signal.as_str().to_uppercase(),
            r.entry_price,
            r.stop_loss,
            r.take_profit
        );
    }

    let recent = recent_closed(&records, args.recent);
    if !recent.is_empty() {
        println!("\n🧾 Last {} Closed Trades", recent.len());
        for r in &recent {
            println!(
                "  {} {:<4} @ {:.2}  {:<4}  {:+.2}",
                r.timestamp.format("%Y-%m-%d %H:%M"),
                r.signal.as_str().to_uppercase(),
                r.entry_price,
                format!("{:?}", r.result).to_uppercase(),
                r.pnl
            );
        }
    }

    if args.curve {
        println!("\n📈 Cumulative PnL");
        for (timestamp, total) in pnl_curve(&records) {
            println!("  {}  {:+.2}", timestamp.format("%Y-%m-%d %H:%M"), total);
        }
    }

    println!();
    Ok(())
}
