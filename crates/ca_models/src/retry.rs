use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use ca_core::Result;

/// Backoff policy for external model calls. This module is the only place
/// failure/backoff policy lives; every call into a provider goes through
/// [`with_backoff`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retry attempts after the initial one.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Hard cap on any single backoff sleep.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

const TRANSIENT_MARKERS: &[&str] = &[
    "503",
    "429",
    "overloaded",
    "unavailable",
    "rate limit",
    "connection reset",
    "connection closed",
    "protocol error",
    "network",
    "timed out",
];

/// Explicit overload conditions back off harder than other transients.
const OVERLOAD_MARKERS: &[&str] = &["503", "429", "overloaded", "unavailable", "rate limit"];

pub fn is_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
}

pub fn is_overload(message: &str) -> bool {
    let message = message.to_lowercase();
    OVERLOAD_MARKERS.iter().any(|m| message.contains(m))
}

pub fn backoff_delay(config: &RetryConfig, attempt: u32, overload: bool) -> Duration {
    let multiplier: f64 = if overload { 2.5 } else { 2.0 };
    let millis = config.base_delay.as_millis() as f64 * multiplier.powi(attempt as i32);
    Duration::from_millis(millis.min(config.max_delay.as_millis() as f64) as u64)
}

/// Run `operation`, retrying transient failures with exponential backoff.
///
/// Errors are classified by message substring because the provider surfaces
/// failures as HTTP body text embedded in `Error::Model`. Non-transient
/// errors propagate immediately, as does a transient one once the retry
/// budget is spent.
pub async fn with_backoff<T, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Call succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(error) => {
                let message = error.to_string();
                if attempt >= config.max_retries || !is_transient(&message) {
                    return Err(error);
                }
                let delay = backoff_delay(config, attempt, is_overload(&message));
                warn!(
                    "Transient model error, retrying {}/{} in {:?}: {}",
                    attempt + 1,
                    config.max_retries,
                    delay,
                    message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig::default().with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_classification() {
        assert!(is_transient("HTTP 503 Service Unavailable"));
        assert!(is_transient("the model is Overloaded, try later"));
        assert!(is_transient("rate limit exceeded"));
        assert!(is_transient("connection reset by peer"));
        assert!(is_transient("stream error: protocol error"));
        assert!(!is_transient("invalid_api_key"));
        assert!(!is_transient("Malformed model output: no JSON found"));
    }

    #[test]
    fn test_overload_backs_off_harder() {
        let config = RetryConfig::default();
        let overload = backoff_delay(&config, 2, true);
        let other = backoff_delay(&config, 2, false);
        assert!(overload > other);
        assert_eq!(other, Duration::from_secs(12));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(backoff_delay(&config, 12, true), config.max_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_retried_to_budget() {
        let calls = AtomicUsize::new(0);
        let config = fast_config();
        let result = with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Model("503 Service Unavailable".to_string())) }
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Model(_)));
        assert_eq!(calls.load(Ordering::SeqCst), config.max_retries as usize + 1);
    }

    #[tokio::test]
    async fn test_fatal_error_propagates_immediately() {
        let calls = AtomicUsize::new(0);
        let result = with_backoff(&fast_config(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Model("invalid_api_key".to_string())) }
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Model(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result = with_backoff(&fast_config(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Error::Model("overloaded".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
