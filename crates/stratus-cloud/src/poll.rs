//! Convergence polling
//!
//! After a mutating call returns, the remote resource converges on its own.
//! [`poll`] fetches the resource at a fixed interval until its status is
//! terminal, the wait budget is spent, or the caller cancels.
//!
//! ```text
//!            ┌──────────── status pending / retryable error ──┐
//!            ▼                                                │
//!        ┌────────┐  success status   ┌─────────┐             │
//!  ───▶  │Pending │ ────────────────▶ │ Success │             │
//!        └────────┘                   └─────────┘             │
//!          │  │ │   failure status    ┌─────────┐             │
//!          │  │ └───────────────────▶ │ Failure │             │
//!          │  │                       └─────────┘             │
//!          │  └──── budget spent ───▶  TimedOut               │
//!          └─────── sleep one interval ───────────────────────┘
//! ```

use crate::error::{ApiError, CloudError};
use crate::resource::ResourceRef;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// An object whose status can be observed while it converges
pub trait Convergent {
    type Status: Clone + PartialEq + fmt::Display + Send + Sync;

    fn status(&self) -> Self::Status;

    /// Human-readable explanation of the current status, if the API gives one
    fn status_reason(&self) -> Option<String> {
        None
    }
}

/// What a not-found fetch means for this wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Not visible yet (propagation lag); keep polling
    Retry,
    /// Waiting for deletion; absence is the goal
    Gone,
}

/// What to wait for and for how long
#[derive(Debug, Clone)]
pub struct PollSpec<S> {
    pub resource: ResourceRef,
    pub success: Vec<S>,
    pub failure: Vec<S>,
    pub interval: Duration,
    pub timeout: Duration,
    pub not_found: NotFoundPolicy,
}

impl<S> PollSpec<S> {
    pub fn new(resource: ResourceRef, timeout: Duration) -> Self {
        Self {
            resource,
            success: Vec::new(),
            failure: Vec::new(),
            interval: Duration::from_secs(10),
            timeout,
            not_found: NotFoundPolicy::Retry,
        }
    }

    pub fn success(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.success = statuses.into_iter().collect();
        self
    }

    pub fn failure(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.failure = statuses.into_iter().collect();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn gone_when_not_found(mut self) -> Self {
        self.not_found = NotFoundPolicy::Gone;
        self
    }
}

/// Outcome of a completed wait
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult<T, S> {
    /// The fetched object reached a success status
    Success(T),
    /// The object no longer exists (only with [`NotFoundPolicy::Gone`])
    Gone,
    /// The object reached a failure status
    Failure { status: S, reason: Option<String> },
    /// The wait budget ran out while still pending
    TimedOut { last_status: Option<S> },
    /// The caller cancelled the wait
    Cancelled { last_status: Option<S> },
}

impl<T, S: fmt::Display> PollResult<T, S> {
    /// Map the outcome onto [`CloudError`]; `Ok(None)` means gone
    pub fn into_result(self, resource: &ResourceRef, timeout: Duration) -> crate::Result<Option<T>> {
        match self {
            PollResult::Success(object) => Ok(Some(object)),
            PollResult::Gone => Ok(None),
            PollResult::Failure { status, reason } => Err(CloudError::TerminalFailure {
                resource: resource.clone(),
                status: status.to_string(),
                reason,
            }),
            PollResult::TimedOut { last_status } => Err(CloudError::TimedOut {
                resource: resource.clone(),
                timeout,
                last_status: last_status.map(|s| s.to_string()),
            }),
            PollResult::Cancelled { last_status } => Err(CloudError::Cancelled {
                resource: resource.clone(),
                last_status: last_status.map(|s| s.to_string()),
            }),
        }
    }
}

/// Poll `fetch` until the object converges
///
/// The first fetch is immediate. Not-found (under [`NotFoundPolicy::Retry`])
/// and retryable errors count as pending; any other error aborts the wait
/// and is returned as is. Sleeps are clamped to the remaining budget and
/// raced against `cancel`.
pub async fn poll<T, F, Fut>(
    spec: &PollSpec<T::Status>,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<PollResult<T, T::Status>, ApiError>
where
    T: Convergent,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let deadline = Instant::now() + spec.timeout;
    let mut last_status: Option<T::Status> = None;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Ok(PollResult::Cancelled { last_status });
        }
        attempt += 1;

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollResult::Cancelled { last_status }),
            fetched = tokio::time::timeout_at(deadline, fetch()) => fetched,
        };

        match fetched {
            Err(_elapsed) => {
                tracing::debug!(resource = %spec.resource, attempt, "Fetch outlived the wait budget");
                return Ok(PollResult::TimedOut { last_status });
            }
            Ok(Ok(object)) => {
                let status = object.status();
                if spec.success.contains(&status) {
                    tracing::debug!(resource = %spec.resource, %status, attempt, "Converged");
                    return Ok(PollResult::Success(object));
                }
                if spec.failure.contains(&status) {
                    let reason = object.status_reason();
                    tracing::warn!(
                        resource = %spec.resource,
                        %status,
                        reason = reason.as_deref().unwrap_or(""),
                        "Reached failure status"
                    );
                    return Ok(PollResult::Failure { status, reason });
                }
                tracing::debug!(resource = %spec.resource, %status, attempt, "Still pending");
                last_status = Some(status);
            }
            Ok(Err(e)) if e.is_not_found() && spec.not_found == NotFoundPolicy::Gone => {
                tracing::debug!(resource = %spec.resource, attempt, "Gone");
                return Ok(PollResult::Gone);
            }
            Ok(Err(e)) if e.is_not_found() || e.is_retryable() => {
                tracing::debug!(resource = %spec.resource, attempt, error = %e, "Retrying fetch");
            }
            Ok(Err(e)) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollResult::TimedOut { last_status });
        }

        let nap = spec.interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollResult::Cancelled { last_status }),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

/// [`poll`], with every outcome other than success or gone turned into a
/// [`CloudError`] naming the resource and `operation`
pub async fn wait_for<T, F, Fut>(
    operation: &'static str,
    spec: &PollSpec<T::Status>,
    cancel: &CancellationToken,
    fetch: F,
) -> crate::Result<Option<T>>
where
    T: Convergent,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    poll(spec, cancel, fetch)
        .await
        .map_err(|e| CloudError::api(operation, &spec.resource, e))?
        .into_result(&spec.resource, spec.timeout)
}
