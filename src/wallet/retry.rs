//! Exponential backoff for idempotent wallet reads
//!
//! Only reads go through here. A payment is never retried automatically:
//! resubmitting could charge the user twice.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::WalletError;

/// Retry behavior for wallet reads
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Base delay, doubled per attempt
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Add up to 50% random jitter
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay_ms,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt.min(63));
        let capped = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);

        let delay = if self.jitter && capped > 0 {
            let factor = 1.0 + rand::thread_rng().gen_range(0.0..0.5);
            (capped as f64 * factor) as u64
        } else {
            capped
        };
        Duration::from_millis(delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out
pub async fn retry_read<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, WalletError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(what, attempt = attempt + 1, ?delay, error = %e, "wallet read failed, retrying");
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(what, attempts = attempt + 1, error = %e, "wallet read gave up");
                return Err(e);
            }
        }
    }
}
