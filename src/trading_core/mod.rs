//! Trading Core - short-trap detection and signal generation
//!
//! - Minute bars and 5-minute session resampling
//! - VWAP, anchored VWAP, MACD and trend slope
//! - Per-symbol trap state
//! - Candidate detection and confirmation
//! - Entry/exit signal generation
//! - Strategy entry point tying it together

pub mod bars;
pub mod indicators;
pub mod state;
pub mod trap;
pub mod signals;
pub mod strategy;

// Re-export commonly used types
pub use bars::{is_strictly_increasing, resample_session, Bar, ResampledSeries};
pub use indicators::{anchored_vwap, macd, session_vwap, trend_slope, Macd};
pub use state::{Bracket, SymbolState, SymbolStates, TrapPhase};
pub use trap::{Confirmation, TrapDetector, TrapInputs, TrapTransition};
pub use signals::{EntrySetup, SignalGenerator};
pub use strategy::{ShortTrapStrategy, SymbolContext};
