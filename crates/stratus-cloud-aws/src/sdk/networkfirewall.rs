use super::sdk_error;
use crate::networkfirewall::NetworkFirewallApi;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_networkfirewall::Client;
use stratus_cloud::ApiError;

/// [`NetworkFirewallApi`] over `aws-sdk-networkfirewall`
#[derive(Clone)]
pub struct NetworkFirewallClient {
    client: Client,
}

impl NetworkFirewallClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl NetworkFirewallApi for NetworkFirewallClient {
    async fn put_resource_policy(&self, resource_arn: &str, policy: &str) -> Result<(), ApiError> {
        self.client
            .put_resource_policy()
            .resource_arn(resource_arn)
            .policy(policy)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_resource_policy(&self, resource_arn: &str) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .describe_resource_policy()
            .resource_arn(resource_arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output.policy().filter(|p| !p.is_empty()).map(str::to_string))
    }

    async fn delete_resource_policy(&self, resource_arn: &str) -> Result<(), ApiError> {
        self.client
            .delete_resource_policy()
            .resource_arn(resource_arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
