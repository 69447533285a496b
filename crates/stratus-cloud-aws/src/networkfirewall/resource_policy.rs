//! Network Firewall resource policies
//!
//! A resource policy shares a firewall policy or rule group with other
//! accounts through RAM. The policy is identified by the ARN of the resource
//! it is attached to.

use crate::arn::Arn;
use crate::policy::{normalize_json, policies_equivalent, validate_policy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use stratus_cloud::{
    message_contains, retry_when, ApiError, CancellationToken, CloudError, Resource, ResourceRef,
    Result, RetryConfig,
};

pub const TYPE_NAME: &str = "Network Firewall Resource Policy";
pub const TYPE_KEY: &str = "networkfirewall_resource_policy";

/// RAM takes a while to let go of a policy it has just seen change
const RAM_PROPAGATION_CODE: &str = "InvalidResourcePolicyException";
const RAM_PROPAGATION_MESSAGE: &str = "The supplied policy does not match RAM managed permissions";
const DELETE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicyConfig {
    pub resource_arn: String,
    /// JSON policy document
    pub policy: String,
}

impl ResourcePolicyConfig {
    pub fn validate(&self) -> Result<()> {
        self.resource_arn.parse::<Arn>()?;
        validate_policy(&self.policy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicyModel {
    /// Same as `resource_arn`
    pub id: String,
    pub resource_arn: String,
    pub policy: String,
}

#[async_trait]
pub trait NetworkFirewallApi: Send + Sync {
    async fn put_resource_policy(
        &self,
        resource_arn: &str,
        policy: &str,
    ) -> std::result::Result<(), ApiError>;

    /// DescribeResourcePolicy; `None` when the response carries no policy
    async fn describe_resource_policy(
        &self,
        resource_arn: &str,
    ) -> std::result::Result<Option<String>, ApiError>;

    async fn delete_resource_policy(&self, resource_arn: &str) -> std::result::Result<(), ApiError>;
}

/// Manages `networkfirewall_resource_policy` resources
pub struct ResourcePolicyResource<A: ?Sized> {
    api: Arc<A>,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl<A: NetworkFirewallApi + ?Sized> ResourcePolicyResource<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Token that interrupts delete retries
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn put(&self, config: &ResourcePolicyConfig, operation: &'static str) -> Result<ResourcePolicyModel> {
        config.validate()?;
        let resource = ResourceRef::new(TYPE_NAME, &config.resource_arn);
        let policy = normalize_json(&config.policy)?;

        tracing::debug!(resource = %resource, "Putting resource policy");
        self.api
            .put_resource_policy(&config.resource_arn, &policy)
            .await
            .map_err(|e| CloudError::api(operation, &resource, e))?;

        let remote = self.fetch(&resource).await?;
        Ok(ResourcePolicyModel {
            id: config.resource_arn.clone(),
            resource_arn: config.resource_arn.clone(),
            policy: policy_to_record(&config.policy, &remote)?,
        })
    }

    async fn fetch(&self, resource: &ResourceRef) -> Result<String> {
        self.api
            .describe_resource_policy(&resource.id)
            .await
            .map_err(|e| CloudError::api("reading", resource, e))?
            .ok_or_else(|| CloudError::EmptyResult {
                operation: "reading",
                resource: resource.clone(),
            })
    }
}

/// Keep the configured text when it says the same as the remote policy
fn policy_to_record(configured: &str, remote: &str) -> Result<String> {
    if policies_equivalent(configured, remote) {
        return Ok(configured.to_string());
    }
    normalize_json(remote)
}

#[async_trait]
impl<A: NetworkFirewallApi + ?Sized> Resource for ResourcePolicyResource<A> {
    type Config = ResourcePolicyConfig;
    type State = ResourcePolicyModel;

    fn type_key(&self) -> &'static str {
        TYPE_KEY
    }

    async fn create(&self, config: &ResourcePolicyConfig) -> Result<ResourcePolicyModel> {
        self.put(config, "putting").await
    }

    async fn read(&self, prior: &ResourcePolicyModel) -> Result<Option<ResourcePolicyModel>> {
        let resource = ResourceRef::new(TYPE_NAME, &prior.id);
        let remote = match self.fetch(&resource).await {
            Ok(policy) => policy,
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = %resource, "Resource policy not found, removing from state");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(Some(ResourcePolicyModel {
            id: prior.id.clone(),
            resource_arn: prior.id.clone(),
            policy: policy_to_record(&prior.policy, &remote)?,
        }))
    }

    async fn update(
        &self,
        prior: &ResourcePolicyModel,
        config: &ResourcePolicyConfig,
    ) -> Result<ResourcePolicyModel> {
        if prior.resource_arn != config.resource_arn {
            return Err(CloudError::RequiresReplacement {
                resource: ResourceRef::new(TYPE_NAME, &prior.id),
                fields: vec!["resource_arn"],
            });
        }
        if policies_equivalent(&prior.policy, &config.policy) {
            tracing::debug!(resource_arn = %prior.id, "Policy unchanged");
            return Ok(prior.clone());
        }
        self.put(config, "updating").await
    }

    async fn delete(&self, state: &ResourcePolicyModel) -> Result<()> {
        let resource = ResourceRef::new(TYPE_NAME, &state.id);
        tracing::debug!(resource = %resource, "Deleting resource policy");

        let deleted = retry_when(
            &self.retry,
            DELETE_TIMEOUT,
            "delete resource policy",
            &self.cancel,
            message_contains(RAM_PROPAGATION_CODE, RAM_PROPAGATION_MESSAGE),
            || self.api.delete_resource_policy(&state.id),
        )
        .await;

        match deleted {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into_cloud_error("deleting", &resource)),
        }
    }

    async fn import(&self, import_id: &str) -> Result<ResourcePolicyModel> {
        import_id.parse::<Arn>()?;
        let resource = ResourceRef::new(TYPE_NAME, import_id);
        let remote = self.fetch(&resource).await?;
        Ok(ResourcePolicyModel {
            id: import_id.to_string(),
            resource_arn: import_id.to_string(),
            policy: normalize_json(&remote)?,
        })
    }
}
