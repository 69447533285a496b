//! Tags of Service Catalog provisioned products
//!
//! Provisioned product tags cannot be changed with tag/untag calls: an
//! UpdateProvisionedProduct replaces the whole tag set and runs as a
//! provisioning record. An update therefore waits twice, first for the
//! record and then for the product to settle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stratus_cloud::{
    wait_for, ApiError, CancellationToken, CloudError, Convergent, PollSpec, ResourceRef,
    ResourceTags, Result, TagContext, TagSet, Timeouts, SYSTEM_TAG_PREFIX,
};

pub const TYPE_NAME: &str = "Service Catalog Provisioned Product";
pub const TYPE_KEY: &str = "servicecatalog_provisioned_product";

const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionedProductStatus {
    Available,
    UnderChange,
    Tainted,
    Error,
    PlanInProgress,
}

impl fmt::Display for ProvisionedProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionedProductStatus::Available => "AVAILABLE",
            ProvisionedProductStatus::UnderChange => "UNDER_CHANGE",
            ProvisionedProductStatus::Tainted => "TAINTED",
            ProvisionedProductStatus::Error => "ERROR",
            ProvisionedProductStatus::PlanInProgress => "PLAN_IN_PROGRESS",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Created,
    InProgress,
    InProgressInError,
    Succeeded,
    Failed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordStatus::Created => "CREATED",
            RecordStatus::InProgress => "IN_PROGRESS",
            RecordStatus::InProgressInError => "IN_PROGRESS_IN_ERROR",
            RecordStatus::Succeeded => "SUCCEEDED",
            RecordStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// DescribeProvisionedProduct output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedProduct {
    pub id: String,
    pub name: String,
    pub status: ProvisionedProductStatus,
    pub status_message: Option<String>,
    pub last_record_id: Option<String>,
    pub tags: TagSet,
}

impl Convergent for ProvisionedProduct {
    type Status = ProvisionedProductStatus;

    fn status(&self) -> ProvisionedProductStatus {
        self.status
    }

    fn status_reason(&self) -> Option<String> {
        self.status_message.clone()
    }
}

/// DescribeRecord output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_id: String,
    pub status: RecordStatus,
    pub errors: Vec<String>,
}

impl Convergent for Record {
    type Status = RecordStatus;

    fn status(&self) -> RecordStatus {
        self.status
    }

    fn status_reason(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

#[async_trait]
pub trait ServiceCatalogApi: Send + Sync {
    async fn describe_provisioned_product(
        &self,
        id: &str,
    ) -> std::result::Result<ProvisionedProduct, ApiError>;

    /// UpdateProvisionedProduct replacing every tag; returns the record ID
    async fn update_provisioned_product_tags(
        &self,
        id: &str,
        tags: &TagSet,
    ) -> std::result::Result<String, ApiError>;

    async fn describe_record(&self, record_id: &str) -> std::result::Result<Record, ApiError>;
}

/// Reads and reconciles the tags of provisioned products
pub struct ProvisionedProductTags<A: ?Sized> {
    api: Arc<A>,
    tags: TagContext,
    timeouts: Timeouts,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl<A: ServiceCatalogApi + ?Sized> ProvisionedProductTags<A> {
    pub fn new(api: Arc<A>, tags: TagContext, cancel: CancellationToken) -> Self {
        Self {
            api,
            tags,
            timeouts: Self::default_timeouts(),
            cancel,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn default_timeouts() -> Timeouts {
        let thirty_minutes = Duration::from_secs(30 * 60);
        Timeouts::new(thirty_minutes, thirty_minutes, thirty_minutes)
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn type_key(&self) -> &'static str {
        TYPE_KEY
    }

    /// Current tags; `None` when the product no longer exists
    pub async fn read(&self, id: &str) -> Result<Option<ResourceTags>> {
        let resource = ResourceRef::new(TYPE_NAME, id);
        match self.api.describe_provisioned_product(id).await {
            Ok(product) => Ok(Some(self.tags.observe(&product.tags))),
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = %resource, "Provisioned product not found");
                Ok(None)
            }
            Err(e) => Err(CloudError::api("reading tags of", &resource, e)),
        }
    }

    /// Move the product's tags to the provider defaults overlaid by `desired`
    pub async fn update(&self, id: &str, desired: &TagSet) -> Result<ResourceTags> {
        let resource = ResourceRef::new(TYPE_NAME, id);
        let merged = self.tags.merged(desired);
        merged.ensure_no_empty_values(&resource)?;

        let product = self
            .api
            .describe_provisioned_product(id)
            .await
            .map_err(|e| CloudError::api("reading tags of", &resource, e))?;

        let delta = self.tags.reconcile(&product.tags, desired);
        if delta.is_empty() {
            tracing::debug!(resource = %resource, "Tags already up to date");
            return Ok(self.tags.observe(&product.tags));
        }

        // The call replaces every tag, so ignored tags are sent back as they are
        let rules = self.tags.ignore_rules();
        let full: TagSet = merged
            .iter()
            .filter(|(k, _)| !rules.is_ignored(k))
            .chain(product.tags.iter().filter(|(k, _)| {
                rules.is_ignored(k) && !k.starts_with(SYSTEM_TAG_PREFIX)
            }))
            .collect();

        tracing::info!(
            resource = %resource,
            added = delta.additions.len(),
            removed = delta.removals.len(),
            "Updating provisioned product tags"
        );
        let record_id = self
            .api
            .update_provisioned_product_tags(id, &full)
            .await
            .map_err(|e| CloudError::api("updating tags of", &resource, e))?;

        let record_spec = PollSpec::new(ResourceRef::new("Service Catalog Record", &record_id), self.timeouts.update)
            .success([RecordStatus::Succeeded])
            .failure([RecordStatus::Failed])
            .interval(self.poll_interval);
        let record = record_id.as_str();
        wait_for("waiting for", &record_spec, &self.cancel, move || {
            self.api.describe_record(record)
        })
        .await?;

        let product_spec = PollSpec::new(resource.clone(), self.timeouts.update)
            .success([ProvisionedProductStatus::Available])
            .failure([ProvisionedProductStatus::Tainted, ProvisionedProductStatus::Error])
            .interval(self.poll_interval);
        let product = wait_for("waiting for update of", &product_spec, &self.cancel, move || {
            self.api.describe_provisioned_product(id)
        })
        .await?
        .ok_or_else(|| CloudError::not_found(&resource))?;

        Ok(self.tags.observe(&product.tags))
    }
}
