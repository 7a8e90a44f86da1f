//! Bounded retry with exponential backoff for medium-level storage I/O

use log::warn;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::storage::StorageError;

/// Retry policy for storage calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub attempts: u32,
    /// Delay before the second attempt; doubled for every further attempt
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Policy that performs a single attempt
    pub fn none() -> Self {
        Self {
            attempts: 1,
            initial_delay_ms: 0,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }
}

/// Run `op`, retrying only when it fails with `StorageError::Unavailable`.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, what: &str, mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(StorageError::Unavailable(msg)) if attempt < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what, attempt, attempts, msg, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
