use std::future::Future;
use std::time::Duration;

use super::FetchError;

/// What an attempt knows about its place in the retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Zero-based.
    pub index: u32,
    pub total: u32,
    pub use_proxy: bool,
}

impl Attempt {
    pub fn is_last(&self) -> bool {
        self.index.saturating_add(1) >= self.total
    }
}

/// Bounded retries with two delay schedules.
///
/// Transient failures wait a fixed `cooldown`. Bot checks flip the proxy
/// setting and back off `blocked_base + blocked_step * attempt`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub cooldown: Duration,
    pub blocked_base: Duration,
    pub blocked_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            cooldown: Duration::from_secs(5),
            blocked_base: Duration::from_secs(5),
            blocked_step: Duration::from_secs(5),
        }
    }

    pub fn delay_after(&self, index: u32, error: &FetchError) -> Duration {
        if error.is_blocked() {
            self.blocked_base
                .saturating_add(self.blocked_step.saturating_mul(index))
        } else {
            self.cooldown
        }
    }

    /// Run `op` until it succeeds or `max_retries + 1` attempts have failed.
    pub async fn run<T, F, Fut>(&self, use_proxy: bool, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let total = self.max_retries.saturating_add(1);
        let mut use_proxy = use_proxy;
        let mut last = String::new();

        for index in 0..total {
            let attempt = Attempt {
                index,
                total,
                use_proxy,
            };
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            tracing::warn!("Attempt {}/{total} failed: {error}", index + 1);
            if !attempt.is_last() {
                if error.is_blocked() {
                    use_proxy = !use_proxy;
                    tracing::info!("Next attempt uses proxy: {use_proxy}");
                }
                tokio::time::sleep(self.delay_after(index, &error)).await;
            }
            last = error.to_string();
        }

        Err(FetchError::Exhausted {
            attempts: total,
            last,
        })
    }
}
