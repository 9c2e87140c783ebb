//! Execution-side plumbing for the strategy
//!
//! Configuration, order intents and the account client used for sizing.
//! Orders are only described here; placing them is the platform's job.

pub mod account;
mod config;
mod order;

pub use account::{AccountClient, RetryPolicy, StaticAccount};
pub use config::{MacdParams, StrategyConfig, TradingWindow};
pub use order::{OrderIntent, OrderSide, OrderType};
