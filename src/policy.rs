//! Retry policy applied around producer sends.

use std::future::Future;
use std::time::Duration;

use crate::error::DispatchError;

/// Fixed-delay retry for transient failures.
///
/// Only errors that report [`DispatchError::is_transient`] are retried;
/// anything else surfaces immediately. `attempts` counts total tries, so
/// `attempts = 1` means no retries at all.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `op`, sleeping `delay` between transient failures.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Result<T, DispatchError>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    tracing::debug!(attempt, error = %err, "transient failure, retrying");
                    attempt += 1;
                    std::thread::sleep(self.delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Async mirror of [`run`](Self::run); sleeps on the tokio timer.
    pub async fn run_async<T, F, Fut>(&self, mut op: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    tracing::debug!(attempt, error = %err, "transient failure, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
