//! Error types for the trading core

use thiserror::Error;

/// Failure to build the 5-minute session frame or its VWAP.
///
/// Never fatal: the strategy logs it and abstains for the bar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResampleError {
    #[error("no bars inside the session window")]
    EmptySession,

    #[error("session frame has zero cumulative volume")]
    ZeroVolume,
}

/// Errors reported by an account collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccountError {
    /// Transient transport failure; eligible for retry.
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything else (bad credentials, malformed response, ...).
    #[error("account error: {0}")]
    Other(String),
}

impl AccountError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Outcome of a retry loop that never succeeded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: AccountError },

    #[error(transparent)]
    Fatal(AccountError),
}

/// Errors that escape a strategy invocation.
///
/// Everything else (insufficient history, closed windows, failed
/// resampling, unreachable account) is a silent "no signal".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    /// Neither a portfolio value nor an account client was supplied.
    #[error("{strategy}: both portfolio_value and account client are missing")]
    MissingPortfolioSource { strategy: String },

    /// Non-retryable failure from the account collaborator.
    #[error(transparent)]
    Account(AccountError),
}
