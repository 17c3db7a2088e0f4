// Technical indicators module
// Volatility (ATR) feeding the breakout filter

pub mod atr;

pub use atr::{calculate_atr, calculate_atr_series, true_range, true_range_series};
