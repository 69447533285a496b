//! AWS provider
//!
//! Turns a [`ProviderConfig`] into the settings every resource shares: the
//! tag context, the account scope, per-type timeout overrides and a
//! cancellation token. Resources are built from here so none of them reads
//! provider-wide settings on its own.

use crate::arn::Arn;
use crate::ds::{DirectoryServiceApi, TrustResource};
use crate::networkfirewall::{NetworkFirewallApi, ResourcePolicyResource};
use crate::securityhub::{SecurityHubAccount, SecurityHubApi};
use crate::servicecatalog::{ProvisionedProductTags, ServiceCatalogApi};
use std::sync::Arc;
use stratus_cloud::{CancellationToken, CloudError, Result, TagContext, Timeouts};
use stratus_config::ProviderConfig;

/// Partition, region and account resources are managed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountScope {
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl AccountScope {
    pub fn new(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    /// ARN of a regional resource in this account
    pub fn arn(&self, service: &str, resource: &str) -> Arn {
        Arn::new(
            &self.partition,
            service,
            &self.region,
            &self.account_id,
            resource,
        )
    }
}

/// AWS provider
pub struct AwsProvider {
    config: ProviderConfig,
    tags: TagContext,
    cancel: CancellationToken,
}

impl AwsProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let tags = TagContext::from_config(&config);
        Self {
            config,
            tags,
            cancel: CancellationToken::new(),
        }
    }

    /// Discover and load the provider configuration file
    pub fn from_config_file() -> Result<Self> {
        let config = stratus_config::load_provider_config()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn tag_context(&self) -> &TagContext {
        &self.tags
    }

    /// Cancel every wait started by resources built from this provider
    pub fn shutdown(&self) {
        tracing::info!("Cancelling pending resource operations");
        self.cancel.cancel();
    }

    /// `defaults` with whatever the configuration sets for `type_key`
    pub fn timeouts(&self, type_key: &str, defaults: Timeouts) -> Timeouts {
        defaults.with_overrides(self.config.timeouts_for(type_key))
    }

    /// Account scope; region and account ID must be configured
    pub fn account_scope(&self) -> Result<AccountScope> {
        let region = self
            .config
            .region
            .clone()
            .ok_or_else(|| CloudError::InvalidConfig("region is not configured".to_string()))?;
        let account_id = self
            .config
            .account_id
            .clone()
            .ok_or_else(|| CloudError::InvalidConfig("account_id is not configured".to_string()))?;
        Ok(AccountScope::new(&self.config.partition, region, account_id))
    }

    pub fn directory_service_trust<A>(&self, api: Arc<A>) -> TrustResource<A>
    where
        A: DirectoryServiceApi + ?Sized,
    {
        let timeouts = self.timeouts(
            crate::ds::trust::TYPE_KEY,
            TrustResource::<A>::default_timeouts(),
        );
        TrustResource::new(api, self.cancel.child_token()).with_timeouts(timeouts)
    }

    pub fn networkfirewall_resource_policy<A>(&self, api: Arc<A>) -> ResourcePolicyResource<A>
    where
        A: NetworkFirewallApi + ?Sized,
    {
        ResourcePolicyResource::new(api).with_cancel(self.cancel.child_token())
    }

    pub fn securityhub_account<A>(&self, api: Arc<A>) -> Result<SecurityHubAccount<A>>
    where
        A: SecurityHubApi + ?Sized,
    {
        Ok(SecurityHubAccount::new(api, self.account_scope()?).with_cancel(self.cancel.child_token()))
    }

    pub fn servicecatalog_provisioned_product_tags<A>(
        &self,
        api: Arc<A>,
    ) -> ProvisionedProductTags<A>
    where
        A: ServiceCatalogApi + ?Sized,
    {
        let timeouts = self.timeouts(
            crate::servicecatalog::provisioned_product::TYPE_KEY,
            ProvisionedProductTags::<A>::default_timeouts(),
        );
        ProvisionedProductTags::new(api, self.tags.clone(), self.cancel.child_token())
            .with_timeouts(timeouts)
    }
}
