//! Account collaborator and the bounded retry used to query it

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{AccountError, RetryError};

/// Source of the current portfolio value (broker account endpoint, paper
/// account, test double).
#[async_trait]
pub trait AccountClient: Send + Sync {
    async fn portfolio_value(&self) -> Result<f64, AccountError>;
}

/// Fixed-count retry on connection errors, with a constant delay.
///
/// A zero delay still yields to the scheduler between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), delay: Duration::ZERO }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails with a non-connection error, or
    /// the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AccountError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_connection() => return Err(RetryError::Fatal(e)),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                Err(e) => {
                    warn!("{} - retrying ({}/{})", e, attempt, self.max_attempts);
                    if self.delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Fixed value; handy for replay runs and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticAccount(pub f64);

#[async_trait]
impl AccountClient for StaticAccount {
    async fn portfolio_value(&self) -> Result<f64, AccountError> {
        Ok(self.0)
    }
}
