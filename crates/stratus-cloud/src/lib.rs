//! Stratus cloud resource core
//!
//! The pieces every managed resource shares: an error taxonomy that keeps
//! domain outcomes apart from transport failures, tag reconciliation against
//! provider default tags, and polling for eventually-consistent operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │         resource orchestration                   │
//! │   (stratus-cloud-aws: trust, policy, account)    │
//! └───────┬─────────────────┬───────────────────────┘
//!         │ tag delta       │ wait for convergence
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌──────────────┐
//! │  tags         │ │  poll         │ │  retry       │
//! │  reconcile()  │ │  poll()       │ │  retry_when()│
//! └───────────────┘ └───────────────┘ └──────────────┘
//! ```
//!
//! Provider-level settings (default tags, ignored keys) are never read from
//! global state: they travel as an explicit [`TagContext`].

pub mod error;
pub mod poll;
pub mod resource;
pub mod retry;
pub mod tags;

// Re-exports
pub use error::{ApiError, ApiErrorKind, CloudError, Result};
pub use poll::{poll, wait_for, Convergent, NotFoundPolicy, PollResult, PollSpec};
pub use resource::{Resource, ResourceRef, Timeouts};
pub use retry::{message_contains, retry_when, RetryConfig, RetryError};
pub use tags::{
    reconcile, reconcile_with, update_tags, IgnoreTags, ResourceTags, TagApi, TagContext,
    TagDelta, TagSet, SYSTEM_TAG_PREFIX,
};
pub use tokio_util::sync::CancellationToken;
