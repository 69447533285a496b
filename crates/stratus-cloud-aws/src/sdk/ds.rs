use super::{sdk_error, to_chrono, unknown_value};
use crate::ds::{
    DirectoryServiceApi, SelectiveAuth, Trust, TrustConfig, TrustDirection, TrustState, TrustType,
};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_directory::types as sdk;
use aws_sdk_directory::Client;
use std::collections::BTreeSet;
use stratus_cloud::ApiError;

/// [`DirectoryServiceApi`] over `aws-sdk-directory`
#[derive(Clone)]
pub struct DirectoryServiceClient {
    client: Client,
}

impl DirectoryServiceClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn trust_from_sdk(t: &sdk::Trust) -> Result<Trust, ApiError> {
    let direction = match t.trust_direction().map(|d| d.as_str()) {
        Some("One-Way: Outgoing") => TrustDirection::OneWayOutgoing,
        Some("One-Way: Incoming") => TrustDirection::OneWayIncoming,
        Some("Two-Way") => TrustDirection::TwoWay,
        other => return Err(unknown_value("trust direction", other.unwrap_or(""))),
    };
    let trust_type = match t.trust_type().map(|d| d.as_str()) {
        Some("External") => TrustType::External,
        Some("Forest") | None => TrustType::Forest,
        Some(other) => return Err(unknown_value("trust type", other)),
    };
    let selective_auth = match t.selective_auth().map(|s| s.as_str()) {
        Some("Enabled") => Some(SelectiveAuth::Enabled),
        Some("Disabled") => Some(SelectiveAuth::Disabled),
        _ => None,
    };
    let state = match t.trust_state().map(|s| s.as_str()).unwrap_or("") {
        "Creating" => TrustState::Creating,
        "Created" => TrustState::Created,
        "Verifying" => TrustState::Verifying,
        "VerifyFailed" => TrustState::VerifyFailed,
        "Verified" => TrustState::Verified,
        "Updating" => TrustState::Updating,
        "UpdateFailed" => TrustState::UpdateFailed,
        "Updated" => TrustState::Updated,
        "Deleting" => TrustState::Deleting,
        "Deleted" => TrustState::Deleted,
        "Failed" => TrustState::Failed,
        other => return Err(unknown_value("trust state", other)),
    };

    Ok(Trust {
        directory_id: t.directory_id().unwrap_or_default().to_string(),
        trust_id: t.trust_id().unwrap_or_default().to_string(),
        remote_domain_name: t.remote_domain_name().unwrap_or_default().to_string(),
        trust_direction: direction,
        trust_type,
        selective_auth,
        trust_state: state,
        trust_state_reason: t.trust_state_reason().map(str::to_string),
        created_date_time: t.created_date_time().and_then(to_chrono),
        last_updated_date_time: t.last_updated_date_time().and_then(to_chrono),
        state_last_updated_date_time: t.state_last_updated_date_time().and_then(to_chrono),
    })
}

#[async_trait]
impl DirectoryServiceApi for DirectoryServiceClient {
    async fn create_trust(&self, config: &TrustConfig) -> Result<String, ApiError> {
        let forwarders: Vec<String> = config.conditional_forwarder_ip_addrs.iter().cloned().collect();
        let output = self
            .client
            .create_trust()
            .directory_id(&config.directory_id)
            .remote_domain_name(&config.remote_domain_name)
            .trust_password(&config.trust_password)
            .trust_direction(sdk::TrustDirection::from(config.trust_direction.as_str()))
            .trust_type(sdk::TrustType::from(config.trust_type.as_str()))
            .selective_auth(sdk::SelectiveAuth::from(config.selective_auth.as_str()))
            .set_conditional_forwarder_ip_addrs((!forwarders.is_empty()).then_some(forwarders))
            .send()
            .await
            .map_err(sdk_error)?;

        output
            .trust_id()
            .map(str::to_string)
            .ok_or_else(|| ApiError::fatal("CreateTrust returned no trust ID"))
    }

    async fn describe_trusts(&self, directory_id: &str) -> Result<Vec<Trust>, ApiError> {
        let mut trusts = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_trusts()
                .directory_id(directory_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)?;

            for trust in output.trusts() {
                trusts.push(trust_from_sdk(trust)?);
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(trusts)
    }

    async fn update_trust(&self, trust_id: &str, selective_auth: SelectiveAuth) -> Result<(), ApiError> {
        self.client
            .update_trust()
            .trust_id(trust_id)
            .selective_auth(sdk::SelectiveAuth::from(selective_auth.as_str()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_trust(
        &self,
        trust_id: &str,
        delete_associated_conditional_forwarder: bool,
    ) -> Result<(), ApiError> {
        self.client
            .delete_trust()
            .trust_id(trust_id)
            .delete_associated_conditional_forwarder(delete_associated_conditional_forwarder)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_conditional_forwarder(
        &self,
        directory_id: &str,
        remote_domain_name: &str,
    ) -> Result<BTreeSet<String>, ApiError> {
        let output = self
            .client
            .describe_conditional_forwarders()
            .directory_id(directory_id)
            .remote_domain_names(remote_domain_name)
            .send()
            .await
            .map_err(sdk_error)?;

        let forwarder = output
            .conditional_forwarders()
            .iter()
            .find(|f| {
                f.remote_domain_name()
                    .is_some_and(|n| n.eq_ignore_ascii_case(remote_domain_name))
            })
            .ok_or_else(|| ApiError::not_found(format!("no conditional forwarder for {}", remote_domain_name)))?;

        Ok(forwarder.dns_ip_addrs().iter().cloned().collect())
    }

    async fn update_conditional_forwarder(
        &self,
        directory_id: &str,
        remote_domain_name: &str,
        dns_ip_addrs: &BTreeSet<String>,
    ) -> Result<(), ApiError> {
        self.client
            .update_conditional_forwarder()
            .directory_id(directory_id)
            .remote_domain_name(remote_domain_name)
            .set_dns_ip_addrs(Some(dns_ip_addrs.iter().cloned().collect()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
