//! Retrying calls that fail while the remote side catches up
//!
//! Some mutating calls are rejected for a while after a related change
//! (for example a policy still being propagated). Those errors come back
//! with a known code and message; [`retry_when`] re-attempts the call while
//! the error matches, backing off between attempts, until a timeout or
//! until the caller cancels.

use crate::error::{ApiError, CloudError};
use crate::resource::ResourceRef;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 = bounded by the timeout only)
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the attempt following `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Why [`retry_when`] stopped without a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// The call failed with an error that is not retried, or retries ran out
    Api(ApiError),
    /// The caller cancelled between attempts; carries the last rejection
    Cancelled { last_error: ApiError },
}

impl RetryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RetryError::Api(e) if e.is_not_found())
    }

    /// Name the resource and operation the retried call concerned
    pub fn into_cloud_error(self, operation: &'static str, resource: &ResourceRef) -> CloudError {
        match self {
            RetryError::Api(e) => CloudError::api(operation, resource, e),
            RetryError::Cancelled { last_error } => CloudError::Cancelled {
                resource: resource.clone(),
                last_status: Some(last_error.to_string()),
            },
        }
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Api(e) => write!(f, "{}", e),
            RetryError::Cancelled { last_error } => write!(f, "cancelled after: {}", last_error),
        }
    }
}

impl std::error::Error for RetryError {}

/// Predicate matching an error code whose message contains `needle`
pub fn message_contains<'a>(code: &'a str, needle: &'a str) -> impl Fn(&ApiError) -> bool + 'a {
    move |e| e.code_message_contains(code, needle)
}

/// Run `operation`, retrying while `should_retry` holds for its error
///
/// Gives up with the last error once `timeout` has elapsed or
/// `max_attempts` is reached. Errors that do not match are returned at once.
/// Cancellation is checked after every rejected attempt and races every sleep.
pub async fn retry_when<T, F, Fut, P>(
    config: &RetryConfig,
    timeout: Duration,
    operation_name: &str,
    cancel: &CancellationToken,
    should_retry: P,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    P: Fn(&ApiError) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !should_retry(&err) {
            return Err(RetryError::Api(err));
        }
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { last_error: err });
        }

        let delay = config.delay_for_attempt(attempt);
        attempt += 1;

        let exhausted = config.max_attempts > 0 && attempt >= config.max_attempts;
        let now = Instant::now();
        if exhausted || now + delay > deadline {
            tracing::warn!(
                operation = %operation_name,
                attempt,
                error = %err,
                "Giving up on retryable error"
            );
            return Err(RetryError::Api(err));
        }

        tracing::debug!(
            operation = %operation_name,
            attempt,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "Operation rejected, retrying"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(operation = %operation_name, attempt, "Retry cancelled");
                return Err(RetryError::Cancelled { last_error: err });
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const CODE: &str = "InvalidResourcePolicyException";
    const NEEDLE: &str = "does not match RAM managed permissions";

    fn propagating() -> ApiError {
        ApiError::fatal("The supplied policy does not match RAM managed permissions")
            .with_code(CODE)
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            backoff_multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(10000)); // capped at max
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_matching_error_until_success() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = retry_when(
            &RetryConfig::default(),
            Duration::from_secs(120),
            "delete policy",
            &CancellationToken::new(),
            message_contains(CODE, NEEDLE),
            || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(propagating()) } else { Ok(n) } }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<(), RetryError> = retry_when(
            &RetryConfig::default(),
            Duration::from_secs(120),
            "delete policy",
            &CancellationToken::new(),
            message_contains(CODE, NEEDLE),
            || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::fatal("denied").with_code("AccessDeniedException")) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_timeout() {
        let start = Instant::now();

        let result: Result<(), RetryError> = retry_when(
            &RetryConfig::default(),
            Duration::from_secs(120),
            "delete policy",
            &CancellationToken::new(),
            message_contains(CODE, NEEDLE),
            || async { Err(propagating()) },
        )
        .await;

        match result {
            Err(RetryError::Api(e)) => assert_eq!(e.code.as_deref(), Some(CODE)),
            other => panic!("expected the last rejection, got {:?}", other),
        }
        assert!(start.elapsed() <= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let config = RetryConfig {
            max_attempts: 3,
            ..Default::default()
        };

        let result: Result<(), RetryError> = retry_when(
            &config,
            Duration::from_secs(3600),
            "disable hub",
            &CancellationToken::new(),
            |e: &ApiError| e.is_retryable(),
            || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::retryable("busy")) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let start = Instant::now();

        let result: Result<(), RetryError> = retry_when(
            &RetryConfig::default(),
            Duration::from_secs(300),
            "disable hub",
            &cancel,
            message_contains(CODE, NEEDLE),
            || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(propagating()) }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(count.load(Ordering::SeqCst) < 5);

        let err = result
            .unwrap_err()
            .into_cloud_error("deleting", &ResourceRef::new("Thing", "t-1"));
        assert!(matches!(err, CloudError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_already_cancelled_still_attempts_once() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = retry_when(
            &RetryConfig::default(),
            Duration::from_secs(120),
            "delete policy",
            &cancel,
            message_contains(CODE, NEEDLE),
            || async { Ok::<_, ApiError>(7) },
        )
        .await;

        assert_eq!(result, Ok(7));
    }
}
