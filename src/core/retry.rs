//! Fixed-delay retry policy for hosting service calls
//!
//! Only transport failures are retried. An HTTP response of any status is a
//! terminal outcome and is handed back to the caller on the first attempt.

use crate::core::error::{PublishError, TransportError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry limits shared by every call a client makes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    /// Delay between attempts in seconds
    pub retry_delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_seconds: 15,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, retry_delay_seconds: u64) -> Self {
        Self {
            max_retries,
            retry_delay_seconds,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Executes operations under a [`RetryConfig`]
///
/// # Examples
///
/// ```no_run
/// use bintray_publisher::core::{RetryConfig, RetryPolicy, TransportError};
///
/// # async fn example() -> Result<(), bintray_publisher::core::PublishError> {
/// let policy = RetryPolicy::new(RetryConfig::new(3, 15));
///
/// let status = policy
///     .execute("get package", || async { Ok::<_, TransportError>(200u16) })
///     .await?;
///
/// assert_eq!(status, 200);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it returns `Ok` or the attempts run out
    ///
    /// Every failed attempt is logged at error level and every retry decision
    /// at info level. When the last attempt fails, its transport error is
    /// returned inside [`PublishError::RetriesExhausted`].
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut attempt: F) -> Result<T, PublishError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let max_attempts = self.config.max_attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let error = match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            tracing::error!(
                operation,
                attempt = attempts,
                max_attempts,
                cause = %error,
                "hosting service call failed"
            );

            if attempts >= max_attempts {
                return Err(PublishError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts,
                    source: error,
                });
            }

            tracing::info!(
                operation,
                next_attempt = attempts + 1,
                delay_seconds = self.config.retry_delay_seconds,
                "retrying hosting service call"
            );
            sleep(self.config.retry_delay()).await;
        }
    }
}
