// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod scheduler;
pub mod strategy;

// Re-export commonly used types
pub use error::{BotError, Result};
pub use models::*;
pub use strategy::Strategy;
