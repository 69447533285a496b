//! Resource abstraction
//!
//! Every managed resource type (trust relationships, resource policies,
//! accounts, ...) implements [`Resource`] against its own typed
//! configuration and state.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use stratus_config::TimeoutOverrides;

/// Identifies a resource in user-visible messages: `Type Name (id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub type_name: &'static str,
    pub id: String,
}

impl ResourceRef {
    pub fn new(type_name: &'static str, id: impl Into<String>) -> Self {
        Self {
            type_name,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.type_name)
        } else {
            write!(f, "{} ({})", self.type_name, self.id)
        }
    }
}

/// Lifecycle of a managed resource
///
/// `read` refreshes a previously recorded state and returns `Ok(None)` when
/// the resource has disappeared and should be dropped. Attributes the API
/// never returns (passwords, create-only flags) are carried over from the
/// prior state. `create` and `update` return the state read back after the
/// resource converged; not finding it at that point is an error.
#[async_trait]
pub trait Resource: Send + Sync {
    type Config: Send + Sync;
    type State: Send + Sync;

    /// Key used for configuration lookups (e.g. "directory_service_trust")
    fn type_key(&self) -> &'static str;

    /// Create the resource and wait until it has converged
    async fn create(&self, config: &Self::Config) -> Result<Self::State>;

    /// Refresh the recorded state from the remote side
    async fn read(&self, prior: &Self::State) -> Result<Option<Self::State>>;

    /// Apply in-place changes and wait until they have converged
    async fn update(&self, prior: &Self::State, config: &Self::Config) -> Result<Self::State>;

    /// Delete the resource and wait until it is gone
    async fn delete(&self, state: &Self::State) -> Result<()>;

    /// Adopt an existing resource by its import identifier
    async fn import(&self, import_id: &str) -> Result<Self::State>;
}

/// Maximum wait per lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn new(create: Duration, update: Duration, delete: Duration) -> Self {
        Self {
            create,
            update,
            delete,
        }
    }

    /// Replace the defaults with whatever the provider configuration sets
    pub fn with_overrides(self, overrides: TimeoutOverrides) -> Self {
        Self {
            create: overrides.create.unwrap_or(self.create),
            update: overrides.update.unwrap_or(self.update),
            delete: overrides.delete.unwrap_or(self.delete),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        let twenty_minutes = Duration::from_secs(20 * 60);
        Self::new(twenty_minutes, twenty_minutes, twenty_minutes)
    }
}
