// Order execution module
pub mod executor;

pub use executor::{round_price, Execution, OrderExecutor};
