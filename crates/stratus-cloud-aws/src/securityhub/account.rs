//! Security Hub enablement for the current account
//!
//! There is one hub per account and region, so the resource ID is the
//! account ID and the hub ARN is derived from the account scope.

use crate::provider::AccountScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stratus_cloud::{
    message_contains, retry_when, ApiError, CancellationToken, CloudError, Resource, ResourceRef,
    Result, RetryConfig,
};

pub const TYPE_NAME: &str = "Security Hub Account";
pub const TYPE_KEY: &str = "securityhub_account";

/// Current version of the recorded state layout
pub const SCHEMA_VERSION: u32 = 1;

const NOT_SUBSCRIBED_CODE: &str = "InvalidAccessException";
const NOT_SUBSCRIBED_MESSAGE: &str = "not subscribed to AWS Security Hub";

/// An administrator account cannot leave while it still has members
const ADMIN_CODE: &str = "InvalidInputException";
const ADMIN_MESSAGE: &str = "Cannot disable Security Hub on the Security Hub administrator";
const ADMIN_ACCOUNT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlFindingGenerator {
    /// One finding per control per enabled standard
    StandardControl,
    /// One finding per control across standards
    SecurityControl,
}

impl ControlFindingGenerator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlFindingGenerator::StandardControl => "STANDARD_CONTROL",
            ControlFindingGenerator::SecurityControl => "SECURITY_CONTROL",
        }
    }
}

impl fmt::Display for ControlFindingGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_true")]
    pub auto_enable_controls: bool,
    #[serde(default)]
    pub control_finding_generator: Option<ControlFindingGenerator>,
    /// Only applied when the hub is enabled
    #[serde(default = "default_true")]
    pub enable_default_standards: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            auto_enable_controls: true,
            control_finding_generator: None,
            enable_default_standards: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountModel {
    /// Account ID
    pub id: String,
    /// Empty in state upgraded from v0 until the next read
    #[serde(default)]
    pub arn: String,
    #[serde(default = "default_true")]
    pub auto_enable_controls: bool,
    #[serde(default)]
    pub control_finding_generator: Option<ControlFindingGenerator>,
    pub enable_default_standards: bool,
}

/// DescribeHub output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hub {
    pub hub_arn: String,
    pub auto_enable_controls: bool,
    pub control_finding_generator: Option<ControlFindingGenerator>,
    pub subscribed_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SecurityHubApi: Send + Sync {
    async fn enable_security_hub(
        &self,
        enable_default_standards: bool,
        control_finding_generator: Option<ControlFindingGenerator>,
    ) -> std::result::Result<(), ApiError>;

    async fn update_security_hub_configuration(
        &self,
        auto_enable_controls: bool,
        control_finding_generator: Option<ControlFindingGenerator>,
    ) -> std::result::Result<(), ApiError>;

    /// `None` when the response is empty
    async fn describe_hub(&self, hub_arn: &str) -> std::result::Result<Option<Hub>, ApiError>;

    async fn disable_security_hub(&self) -> std::result::Result<(), ApiError>;
}

/// Manages the `securityhub_account` resource
pub struct SecurityHubAccount<A: ?Sized> {
    api: Arc<A>,
    scope: AccountScope,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl<A: SecurityHubApi + ?Sized> SecurityHubAccount<A> {
    pub fn new(api: Arc<A>, scope: AccountScope) -> Self {
        Self {
            api,
            scope,
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

    /// `arn:{partition}:securityhub:{region}:{account}:hub/default`
    pub fn hub_arn(&self) -> String {
        self.scope.arn("securityhub", "hub/default").to_string()
    }

    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(TYPE_NAME, &self.scope.account_id)
    }

    /// DescribeHub with "not subscribed" mapped to not found
    pub async fn find_hub(&self) -> std::result::Result<Hub, ApiError> {
        match self.api.describe_hub(&self.hub_arn()).await {
            Ok(Some(hub)) => Ok(hub),
            Ok(None) => Err(ApiError::fatal("DescribeHub returned an empty result")),
            Err(e) if e.code_message_contains(NOT_SUBSCRIBED_CODE, NOT_SUBSCRIBED_MESSAGE) => {
                Err(ApiError::not_found(e.message).with_code(NOT_SUBSCRIBED_CODE))
            }
            Err(e) => Err(e),
        }
    }

    async fn read_back(&self, enable_default_standards: bool) -> Result<AccountModel> {
        let resource = self.resource_ref();
        let hub = self
            .find_hub()
            .await
            .map_err(|e| CloudError::api("reading", &resource, e))?;
        Ok(self.model(hub, enable_default_standards))
    }

    fn model(&self, hub: Hub, enable_default_standards: bool) -> AccountModel {
        AccountModel {
            id: self.scope.account_id.clone(),
            arn: hub.hub_arn,
            auto_enable_controls: hub.auto_enable_controls,
            control_finding_generator: hub.control_finding_generator,
            enable_default_standards,
        }
    }
}

#[async_trait]
impl<A: SecurityHubApi + ?Sized> Resource for SecurityHubAccount<A> {
    type Config = AccountConfig;
    type State = AccountModel;

    fn type_key(&self) -> &'static str {
        TYPE_KEY
    }

    async fn create(&self, config: &AccountConfig) -> Result<AccountModel> {
        let resource = self.resource_ref();
        tracing::info!(
            resource = %resource,
            enable_default_standards = config.enable_default_standards,
            "Enabling Security Hub"
        );

        self.api
            .enable_security_hub(config.enable_default_standards, config.control_finding_generator)
            .await
            .map_err(|e| CloudError::api("creating", &resource, e))?;

        self.api
            .update_security_hub_configuration(config.auto_enable_controls, None)
            .await
            .map_err(|e| CloudError::api("updating", &resource, e))?;

        self.read_back(config.enable_default_standards).await
    }

    async fn read(&self, prior: &AccountModel) -> Result<Option<AccountModel>> {
        let resource = self.resource_ref();
        match self.find_hub().await {
            Ok(hub) => Ok(Some(self.model(hub, prior.enable_default_standards))),
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = %resource, "Security Hub not enabled, removing from state");
                Ok(None)
            }
            Err(e) => Err(CloudError::api("reading", &resource, e)),
        }
    }

    async fn update(&self, prior: &AccountModel, config: &AccountConfig) -> Result<AccountModel> {
        let resource = self.resource_ref();
        if prior.enable_default_standards != config.enable_default_standards {
            return Err(CloudError::RequiresReplacement {
                resource,
                fields: vec!["enable_default_standards"],
            });
        }

        // An unset generator keeps whatever the hub currently uses
        let generator = config
            .control_finding_generator
            .filter(|g| prior.control_finding_generator != Some(*g));
        tracing::debug!(
            resource = %resource,
            auto_enable_controls = config.auto_enable_controls,
            generator = ?generator,
            "Updating Security Hub configuration"
        );
        self.api
            .update_security_hub_configuration(config.auto_enable_controls, generator)
            .await
            .map_err(|e| CloudError::api("updating", &resource, e))?;

        self.read_back(prior.enable_default_standards).await
    }

    async fn delete(&self, _state: &AccountModel) -> Result<()> {
        let resource = self.resource_ref();
        tracing::info!(resource = %resource, "Disabling Security Hub");

        let disabled = retry_when(
            &self.retry,
            ADMIN_ACCOUNT_TIMEOUT,
            "disable security hub",
            &self.cancel,
            message_contains(ADMIN_CODE, ADMIN_MESSAGE),
            || self.api.disable_security_hub(),
        )
        .await;

        match disabled {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into_cloud_error("deleting", &resource)),
        }
    }

    async fn import(&self, import_id: &str) -> Result<AccountModel> {
        if import_id != self.scope.account_id {
            return Err(CloudError::InvalidConfig(format!(
                "import ID {:?} does not match the configured account {}",
                import_id, self.scope.account_id
            )));
        }
        // The original setting is unknowable; the schema default applies
        self.read_back(true).await
    }
}

/// Upgrade state recorded before `enable_default_standards` existed
pub fn upgrade_state_v0(mut raw: Value) -> Result<Value> {
    let object = raw
        .as_object_mut()
        .ok_or_else(|| CloudError::InvalidConfig("state must be a JSON object".to_string()))?;
    if object.get("enable_default_standards").is_none_or(Value::is_null) {
        object.insert("enable_default_standards".to_string(), Value::Bool(true));
    }
    Ok(raw)
}

/// Decode recorded state of any version
pub fn decode_state(version: u32, raw: Value) -> Result<AccountModel> {
    let raw = match version {
        0 => upgrade_state_v0(raw)?,
        SCHEMA_VERSION => raw,
        other => {
            return Err(CloudError::InvalidConfig(format!(
                "unknown {} state version {}",
                TYPE_NAME, other
            )));
        }
    };
    Ok(serde_json::from_value(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config: AccountConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AccountConfig::default());
        assert!(config.auto_enable_controls);
        assert!(config.enable_default_standards);
        assert_eq!(config.control_finding_generator, None);
    }

    #[test]
    fn test_generator_wire_names() {
        let config: AccountConfig =
            serde_json::from_str(r#"{"control_finding_generator":"SECURITY_CONTROL"}"#).unwrap();
        assert_eq!(
            config.control_finding_generator,
            Some(ControlFindingGenerator::SecurityControl)
        );
        assert_eq!(ControlFindingGenerator::StandardControl.to_string(), "STANDARD_CONTROL");
    }

    #[test]
    fn test_upgrade_v0_fills_missing_flag() {
        let upgraded = upgrade_state_v0(json!({"id": "123456789012"})).unwrap();
        assert_eq!(upgraded["enable_default_standards"], json!(true));

        let upgraded = upgrade_state_v0(json!({"enable_default_standards": null})).unwrap();
        assert_eq!(upgraded["enable_default_standards"], json!(true));

        let kept = upgrade_state_v0(json!({"enable_default_standards": false})).unwrap();
        assert_eq!(kept["enable_default_standards"], json!(false));
    }

    #[test]
    fn test_decode_state_v0_id_only() {
        let model = decode_state(0, json!({"id": "123456789012"})).unwrap();
        assert_eq!(
            model,
            AccountModel {
                id: "123456789012".to_string(),
                arn: String::new(),
                auto_enable_controls: true,
                control_finding_generator: None,
                enable_default_standards: true,
            }
        );
    }

    #[test]
    fn test_decode_state_v0() {
        let model = decode_state(
            0,
            json!({
                "id": "123456789012",
                "arn": "arn:aws:securityhub:us-west-2:123456789012:hub/default",
                "auto_enable_controls": true,
                "control_finding_generator": null
            }),
        )
        .unwrap();
        assert!(model.enable_default_standards);
        assert!(decode_state(7, json!({})).is_err());
    }
}
