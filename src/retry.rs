//! Retry policy shared by every collaborator boundary.
//!
//! Transient failures back off exponentially up to a cap; an expired access
//! token triggers one refresh and an immediate retry; anything else is
//! returned to the caller untouched.

use crate::error::ProviderError;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        let ms = self.base_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Run `op` under this policy.
    ///
    /// `refresh` is awaited once when `op` reports [`ProviderError::Unauthorized`];
    /// the retry that follows neither sleeps nor counts as an attempt.
    pub async fn run<T, Op, OpFut, Refresh, RefreshFut>(
        &self,
        name: &str,
        mut op: Op,
        mut refresh: Refresh,
    ) -> Result<T, ProviderError>
    where
        Op: FnMut() -> OpFut,
        OpFut: Future<Output = Result<T, ProviderError>>,
        Refresh: FnMut() -> RefreshFut,
        RefreshFut: Future<Output = Result<(), ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(ProviderError::Unauthorized) if !refreshed => {
                    debug!(op = name, "access token rejected, refreshing");
                    refreshed = true;
                    attempt -= 1;
                    refresh().await?;
                }
                Err(e) if e.is_transient() => {
                    if attempt >= max_attempts {
                        return Err(ProviderError::Exhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.backoff(attempt - 1);
                    warn!(op = name, attempt, ?delay, error = %e, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
