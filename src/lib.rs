// Library crate - short-trap strategy, indicators and shared types

pub mod error;
pub mod execution;
pub mod trading_core;
pub mod types;

// Re-export commonly used types
pub use error::{AccountError, ResampleError, RetryError, StrategyError};
pub use execution::{AccountClient, StrategyConfig};
pub use trading_core::{ShortTrapStrategy, SymbolContext, SymbolState, SymbolStates};
pub use types::*;
