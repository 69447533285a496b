use super::sdk_error;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lightsail::types::Tag;
use aws_sdk_lightsail::Client;
use std::collections::BTreeSet;
use stratus_cloud::{ApiError, TagApi, TagSet};

/// [`TagApi`] over `aws-sdk-lightsail`; identifiers are resource names
#[derive(Clone)]
pub struct LightsailClient {
    client: Client,
}

impl LightsailClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl TagApi for LightsailClient {
    async fn tag_resource(&self, identifier: &str, tags: &TagSet) -> Result<(), ApiError> {
        let tags: Vec<Tag> = tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect();
        self.client
            .tag_resource()
            .resource_name(identifier)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn untag_resource(&self, identifier: &str, keys: &BTreeSet<String>) -> Result<(), ApiError> {
        self.client
            .untag_resource()
            .resource_name(identifier)
            .set_tag_keys(Some(keys.iter().cloned().collect()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
