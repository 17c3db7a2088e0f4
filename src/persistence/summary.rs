use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{TradeRecord, TradeResult};

/// Performance over closed (win/loss) ledger rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage, rounded to 2 dp
    pub win_rate: f64,
    pub avg_pnl: f64,
    pub net_profit: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl LedgerSummary {
    pub fn from_records(records: &[TradeRecord]) -> Self {
        let closed: Vec<&TradeRecord> = records.iter().filter(|r| r.result.is_closed()).collect();
        let wins = closed.iter().filter(|r| r.result == TradeResult::Win).count();
        let losses = closed.len() - wins;
        let net_profit: f64 = closed.iter().map(|r| r.pnl).sum();

        let (win_rate, avg_pnl) = if closed.is_empty() {
            (0.0, 0.0)
        } else {
            (
                wins as f64 / closed.len() as f64 * 100.0,
                net_profit / closed.len() as f64,
            )
        };

        Self {
            total: closed.len(),
            wins,
            losses,
            win_rate: round2(win_rate),
            avg_pnl: round2(avg_pnl),
            net_profit: round2(net_profit),
        }
    }
}

/// Rows still waiting for their bracket to resolve
pub fn open_trades(records: &[TradeRecord]) -> Vec<&TradeRecord> {
    records
        .iter()
        .filter(|r| r.result == TradeResult::Open)
        .collect()
}

/// The last `n` closed rows, in ledger order
pub fn recent_closed(records: &[TradeRecord], n: usize) -> Vec<&TradeRecord> {
    let closed: Vec<&TradeRecord> = records.iter().filter(|r| r.result.is_closed()).collect();
    let skip = closed.len().saturating_sub(n);
    closed.into_iter().skip(skip).collect()
}

/// Cumulative pnl of closed rows, in ledger order
pub fn pnl_curve(records: &[TradeRecord]) -> Vec<(DateTime<Utc>, f64)> {
    records
        .iter()
        .filter(|r| r.result.is_closed())
        .scan(0.0, |total, r| {
            *total += r.pnl;
            Some((r.timestamp, *total))
        })
        .collect()
}
