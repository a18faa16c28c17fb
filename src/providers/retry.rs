use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ProviderError;

/// Exponential backoff bounds for one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt: the current step or the server hint,
    /// whichever is longer, never above the ceiling.
    fn next_delay(&self, current: Duration, hint: Option<Duration>) -> Duration {
        current.max(hint.unwrap_or_default()).min(self.max_delay)
    }
}

/// Result of fetching a single page under a [`RetryPolicy`].
/// `delays` lists every backoff sleep taken, in order.
#[derive(Debug)]
pub enum PageOutcome<T> {
    Fetched { page: T, delays: Vec<Duration> },
    /// Every attempt failed with a transient error.
    Exhausted {
        last_error: ProviderError,
        delays: Vec<Duration>,
    },
    /// A non-transient error ended the page.
    Failed {
        error: ProviderError,
        delays: Vec<Duration>,
    },
}

impl<T> PageOutcome<T> {
    pub fn delays(&self) -> &[Duration] {
        match self {
            PageOutcome::Fetched { delays, .. }
            | PageOutcome::Exhausted { delays, .. }
            | PageOutcome::Failed { delays, .. } => delays,
        }
    }
}

/// Run `request` until it succeeds, fails permanently, or attempts run out.
pub async fn fetch_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    pacer: &Pacer,
    mut request: F,
) -> PageOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut current = policy.base_delay;
    let mut delays = Vec::new();
    let mut attempt = 0;

    loop {
        attempt += 1;
        pacer.wait().await;
        let error = match request().await {
            Ok(page) => return PageOutcome::Fetched { page, delays },
            Err(e) if !e.is_transient() => {
                return PageOutcome::Failed { error: e, delays };
            }
            Err(e) => e,
        };

        if attempt >= attempts {
            warn!(attempts, error = %error, "retries exhausted");
            return PageOutcome::Exhausted {
                last_error: error,
                delays,
            };
        }

        let delay = policy.next_delay(current, error.retry_after());
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying after transient error"
        );
        tokio::time::sleep(delay).await;
        delays.push(delay);
        current = current.saturating_mul(2);
    }
}

/// Minimum spacing between consecutive requests to one provider.
///
/// The lock is held across the sleep, so concurrent callers queue up.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
