use super::{sdk_error, unknown_value};
use crate::securityhub::{ControlFindingGenerator, Hub, SecurityHubApi};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_securityhub::types as sdk;
use aws_sdk_securityhub::Client;
use chrono::{DateTime, Utc};
use stratus_cloud::ApiError;

/// [`SecurityHubApi`] over `aws-sdk-securityhub`
#[derive(Clone)]
pub struct SecurityHubClient {
    client: Client,
}

impl SecurityHubClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn generator(g: Option<ControlFindingGenerator>) -> Option<sdk::ControlFindingGenerator> {
    g.map(|g| sdk::ControlFindingGenerator::from(g.as_str()))
}

#[async_trait]
impl SecurityHubApi for SecurityHubClient {
    async fn enable_security_hub(
        &self,
        enable_default_standards: bool,
        control_finding_generator: Option<ControlFindingGenerator>,
    ) -> Result<(), ApiError> {
        self.client
            .enable_security_hub()
            .enable_default_standards(enable_default_standards)
            .set_control_finding_generator(generator(control_finding_generator))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn update_security_hub_configuration(
        &self,
        auto_enable_controls: bool,
        control_finding_generator: Option<ControlFindingGenerator>,
    ) -> Result<(), ApiError> {
        self.client
            .update_security_hub_configuration()
            .auto_enable_controls(auto_enable_controls)
            .set_control_finding_generator(generator(control_finding_generator))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_hub(&self, hub_arn: &str) -> Result<Option<Hub>, ApiError> {
        let output = self
            .client
            .describe_hub()
            .hub_arn(hub_arn)
            .send()
            .await
            .map_err(sdk_error)?;

        let Some(arn) = output.hub_arn() else {
            return Ok(None);
        };
        let control_finding_generator = match output.control_finding_generator().map(|g| g.as_str()) {
            Some("STANDARD_CONTROL") => Some(ControlFindingGenerator::StandardControl),
            Some("SECURITY_CONTROL") => Some(ControlFindingGenerator::SecurityControl),
            None => None,
            Some(other) => return Err(unknown_value("control finding generator", other)),
        };

        Ok(Some(Hub {
            hub_arn: arn.to_string(),
            auto_enable_controls: output.auto_enable_controls().unwrap_or(true),
            control_finding_generator,
            subscribed_at: output
                .subscribed_at()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc)),
        }))
    }

    async fn disable_security_hub(&self) -> Result<(), ApiError> {
        self.client
            .disable_security_hub()
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
