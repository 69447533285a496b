//! Directory Service trust relationships
//!
//! A trust links a managed directory to a remote domain. Creating one only
//! configures this side: the trust stays `VerifyFailed` until the remote
//! side is configured as well, which is why `VerifyFailed` counts as a
//! completed create here and the reason is kept on the model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use stratus_cloud::{
    wait_for, ApiError, CancellationToken, CloudError, Convergent, PollSpec, Resource,
    ResourceRef, Result, Timeouts,
};

pub const TYPE_NAME: &str = "Directory Service Trust";
pub const TYPE_KEY: &str = "directory_service_trust";

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const PASSWORD_MAX_LEN: usize = 128;

static DIRECTORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^d-[0-9a-f]{10}$").expect("directory id pattern is valid"));
static DOMAIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9]+[\.-])+([a-zA-Z0-9])+[.]?$").expect("domain pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustDirection {
    #[serde(rename = "One-Way: Outgoing")]
    OneWayOutgoing,
    #[serde(rename = "One-Way: Incoming")]
    OneWayIncoming,
    #[serde(rename = "Two-Way")]
    TwoWay,
}

impl TrustDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustDirection::OneWayOutgoing => "One-Way: Outgoing",
            TrustDirection::OneWayIncoming => "One-Way: Incoming",
            TrustDirection::TwoWay => "Two-Way",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustType {
    #[default]
    Forest,
    External,
}

impl TrustType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustType::Forest => "Forest",
            TrustType::External => "External",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectiveAuth {
    Enabled,
    #[default]
    Disabled,
}

impl SelectiveAuth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectiveAuth::Enabled => "Enabled",
            SelectiveAuth::Disabled => "Disabled",
        }
    }
}

/// Lifecycle state reported by DescribeTrusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustState {
    Creating,
    Created,
    Verifying,
    VerifyFailed,
    Verified,
    Updating,
    UpdateFailed,
    Updated,
    Deleting,
    Deleted,
    Failed,
}

impl TrustState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustState::Creating => "Creating",
            TrustState::Created => "Created",
            TrustState::Verifying => "Verifying",
            TrustState::VerifyFailed => "VerifyFailed",
            TrustState::Verified => "Verified",
            TrustState::Updating => "Updating",
            TrustState::UpdateFailed => "UpdateFailed",
            TrustState::Updated => "Updated",
            TrustState::Deleting => "Deleting",
            TrustState::Deleted => "Deleted",
            TrustState::Failed => "Failed",
        }
    }
}

impl fmt::Display for TrustState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired trust configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    pub directory_id: String,
    pub remote_domain_name: String,
    pub trust_direction: TrustDirection,
    /// Never returned by the API
    pub trust_password: String,
    #[serde(default)]
    pub trust_type: TrustType,
    #[serde(default)]
    pub conditional_forwarder_ip_addrs: BTreeSet<String>,
    #[serde(default)]
    pub selective_auth: SelectiveAuth,
    #[serde(default)]
    pub delete_associated_conditional_forwarder: bool,
}

impl TrustConfig {
    pub fn validate(&self) -> Result<()> {
        if !DIRECTORY_ID.is_match(&self.directory_id) {
            return Err(CloudError::InvalidConfig(format!(
                "directory_id {:?} is not a directory ID (d-xxxxxxxxxx)",
                self.directory_id
            )));
        }
        if !DOMAIN_NAME.is_match(&self.remote_domain_name) {
            return Err(CloudError::InvalidConfig(format!(
                "remote_domain_name {:?} is not a fully qualified domain name",
                self.remote_domain_name
            )));
        }
        if self.trust_password.is_empty() || self.trust_password.len() > PASSWORD_MAX_LEN {
            return Err(CloudError::InvalidConfig(format!(
                "trust_password must be between 1 and {} characters",
                PASSWORD_MAX_LEN
            )));
        }
        for addr in &self.conditional_forwarder_ip_addrs {
            if addr.parse::<IpAddr>().is_err() {
                return Err(CloudError::InvalidConfig(format!(
                    "conditional_forwarder_ip_addrs: {:?} is not an IP address",
                    addr
                )));
            }
        }
        Ok(())
    }

    /// Fields whose change cannot be applied to an existing trust
    pub fn replacement_fields(&self, desired: &TrustConfig) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.directory_id != desired.directory_id {
            fields.push("directory_id");
        }
        if self.remote_domain_name != desired.remote_domain_name {
            fields.push("remote_domain_name");
        }
        if self.trust_direction != desired.trust_direction {
            fields.push("trust_direction");
        }
        if self.trust_type != desired.trust_type {
            fields.push("trust_type");
        }
        // No call changes the password; an empty prior password is unknown (imported)
        if !self.trust_password.is_empty() && self.trust_password != desired.trust_password {
            fields.push("trust_password");
        }
        // UpdateConditionalForwarder needs at least one address
        if desired.conditional_forwarder_ip_addrs.is_empty()
            && !self.conditional_forwarder_ip_addrs.is_empty()
        {
            fields.push("conditional_forwarder_ip_addrs");
        }
        fields
    }
}

/// A trust as reported by the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trust {
    pub directory_id: String,
    pub trust_id: String,
    pub remote_domain_name: String,
    pub trust_direction: TrustDirection,
    pub trust_type: TrustType,
    pub selective_auth: Option<SelectiveAuth>,
    pub trust_state: TrustState,
    pub trust_state_reason: Option<String>,
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_updated_date_time: Option<DateTime<Utc>>,
    pub state_last_updated_date_time: Option<DateTime<Utc>>,
}

impl Convergent for Trust {
    type Status = TrustState;

    fn status(&self) -> TrustState {
        self.trust_state
    }

    fn status_reason(&self) -> Option<String> {
        self.trust_state_reason.clone()
    }
}

/// Recorded state of a managed trust
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustModel {
    /// Trust ID (t-xxxxxxxxxx)
    pub id: String,
    #[serde(flatten)]
    pub config: TrustConfig,
    pub trust_state: TrustState,
    pub trust_state_reason: Option<String>,
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_updated_date_time: Option<DateTime<Utc>>,
    pub state_last_updated_date_time: Option<DateTime<Utc>>,
}

impl TrustModel {
    /// Combine a fetched trust with the attributes the API never returns
    fn from_remote(
        trust: Trust,
        conditional_forwarder_ip_addrs: BTreeSet<String>,
        trust_password: String,
        delete_associated_conditional_forwarder: bool,
    ) -> Self {
        Self {
            id: trust.trust_id,
            config: TrustConfig {
                directory_id: trust.directory_id,
                remote_domain_name: trust.remote_domain_name,
                trust_direction: trust.trust_direction,
                trust_password,
                trust_type: trust.trust_type,
                conditional_forwarder_ip_addrs,
                selective_auth: trust.selective_auth.unwrap_or_default(),
                delete_associated_conditional_forwarder,
            },
            trust_state: trust.trust_state,
            trust_state_reason: trust.trust_state_reason.filter(|r| !r.is_empty()),
            created_date_time: trust.created_date_time,
            last_updated_date_time: trust.last_updated_date_time,
            state_last_updated_date_time: trust.state_last_updated_date_time,
        }
    }
}

/// Directory Service calls used by [`TrustResource`]
#[async_trait]
pub trait DirectoryServiceApi: Send + Sync {
    /// CreateTrust; returns the new trust ID
    async fn create_trust(&self, config: &TrustConfig) -> std::result::Result<String, ApiError>;

    /// DescribeTrusts for one directory, all pages
    async fn describe_trusts(&self, directory_id: &str) -> std::result::Result<Vec<Trust>, ApiError>;

    async fn update_trust(
        &self,
        trust_id: &str,
        selective_auth: SelectiveAuth,
    ) -> std::result::Result<(), ApiError>;

    async fn delete_trust(
        &self,
        trust_id: &str,
        delete_associated_conditional_forwarder: bool,
    ) -> std::result::Result<(), ApiError>;

    /// DNS addresses of the conditional forwarder for a remote domain
    async fn describe_conditional_forwarder(
        &self,
        directory_id: &str,
        remote_domain_name: &str,
    ) -> std::result::Result<BTreeSet<String>, ApiError>;

    async fn update_conditional_forwarder(
        &self,
        directory_id: &str,
        remote_domain_name: &str,
        dns_ip_addrs: &BTreeSet<String>,
    ) -> std::result::Result<(), ApiError>;
}

/// Manages `directory_service_trust` resources
pub struct TrustResource<A: ?Sized> {
    api: Arc<A>,
    timeouts: Timeouts,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl<A: DirectoryServiceApi + ?Sized> TrustResource<A> {
    pub fn new(api: Arc<A>, cancel: CancellationToken) -> Self {
        Self {
            api,
            timeouts: Self::default_timeouts(),
            cancel,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn default_timeouts() -> Timeouts {
        Timeouts::new(
            Duration::from_secs(10 * 60),
            Duration::from_secs(10 * 60),
            Duration::from_secs(5 * 60),
        )
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn resource_ref(id: &str) -> ResourceRef {
        ResourceRef::new(TYPE_NAME, id)
    }

    /// Look a trust up by ID; a deleted trust counts as not found
    pub async fn find_trust_by_id(
        &self,
        directory_id: &str,
        trust_id: &str,
    ) -> std::result::Result<Trust, ApiError> {
        self.find_trust(directory_id, |t| t.trust_id == trust_id)
            .await
            .map_err(|e| e.or_describe(format!("trust {} not found in {}", trust_id, directory_id)))
    }

    /// Look a trust up by the remote domain it points at
    pub async fn find_trust_by_domain(
        &self,
        directory_id: &str,
        remote_domain_name: &str,
    ) -> std::result::Result<Trust, ApiError> {
        self.find_trust(directory_id, |t| {
            t.remote_domain_name.eq_ignore_ascii_case(remote_domain_name)
        })
        .await
        .map_err(|e| {
            e.or_describe(format!(
                "no trust for {} in {}",
                remote_domain_name, directory_id
            ))
        })
    }

    async fn find_trust<P>(&self, directory_id: &str, matches: P) -> std::result::Result<Trust, FindError>
    where
        P: Fn(&Trust) -> bool,
    {
        let trusts = self
            .api
            .describe_trusts(directory_id)
            .await
            .map_err(FindError::Api)?;
        trusts
            .into_iter()
            .filter(|t| t.trust_state != TrustState::Deleted)
            .find(|t| matches(t))
            .ok_or(FindError::Missing)
    }

    async fn conditional_forwarder_ips(
        &self,
        directory_id: &str,
        remote_domain_name: &str,
    ) -> std::result::Result<BTreeSet<String>, ApiError> {
        match self
            .api
            .describe_conditional_forwarder(directory_id, remote_domain_name)
            .await
        {
            Ok(addrs) => Ok(addrs),
            Err(e) if e.is_not_found() => Ok(BTreeSet::new()),
            Err(e) => Err(e),
        }
    }

    async fn refresh(
        &self,
        trust: Trust,
        trust_password: String,
        delete_associated_conditional_forwarder: bool,
    ) -> Result<TrustModel> {
        let resource = Self::resource_ref(&trust.trust_id);
        let forwarders = self
            .conditional_forwarder_ips(&trust.directory_id, &trust.remote_domain_name)
            .await
            .map_err(|e| CloudError::api("reading conditional forwarder of", &resource, e))?;

        Ok(TrustModel::from_remote(
            trust,
            forwarders,
            trust_password,
            delete_associated_conditional_forwarder,
        ))
    }

    fn poll_spec(&self, id: &str, timeout: Duration) -> PollSpec<TrustState> {
        PollSpec::new(Self::resource_ref(id), timeout).interval(self.poll_interval)
    }
}

/// Lookup failure that keeps "no match" apart from a failed call
enum FindError {
    Api(ApiError),
    Missing,
}

impl FindError {
    fn or_describe(self, message: String) -> ApiError {
        match self {
            FindError::Api(e) => e,
            FindError::Missing => ApiError::not_found(message),
        }
    }
}

#[async_trait]
impl<A: DirectoryServiceApi + ?Sized> Resource for TrustResource<A> {
    type Config = TrustConfig;
    type State = TrustModel;

    fn type_key(&self) -> &'static str {
        TYPE_KEY
    }

    async fn create(&self, config: &TrustConfig) -> Result<TrustModel> {
        config.validate()?;

        tracing::info!(
            directory_id = %config.directory_id,
            remote_domain_name = %config.remote_domain_name,
            direction = config.trust_direction.as_str(),
            "Creating trust"
        );
        let trust_id = self
            .api
            .create_trust(config)
            .await
            .map_err(|e| CloudError::api("creating", &Self::resource_ref(&config.remote_domain_name), e))?;

        let spec = self
            .poll_spec(&trust_id, self.timeouts.create)
            .success([TrustState::Verified, TrustState::VerifyFailed])
            .failure([TrustState::Failed]);
        let directory_id = config.directory_id.as_str();
        let id = trust_id.as_str();
        let trust = wait_for("waiting for creation of", &spec, &self.cancel, move || {
            self.find_trust_by_id(directory_id, id)
        })
        .await?
        .ok_or_else(|| CloudError::not_found(&spec.resource))?;

        if trust.trust_state == TrustState::VerifyFailed {
            tracing::warn!(
                resource = %spec.resource,
                reason = trust.trust_state_reason.as_deref().unwrap_or(""),
                "Trust created but not verified; the remote side may not be configured yet"
            );
        }

        let model = self
            .refresh(
                trust,
                config.trust_password.clone(),
                config.delete_associated_conditional_forwarder,
            )
            .await?;
        tracing::info!(resource = %spec.resource, state = %model.trust_state, "Created trust");
        Ok(model)
    }

    async fn read(&self, prior: &TrustModel) -> Result<Option<TrustModel>> {
        let resource = Self::resource_ref(&prior.id);
        let trust = match self
            .find_trust_by_id(&prior.config.directory_id, &prior.id)
            .await
        {
            Ok(trust) => trust,
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = %resource, "Trust not found, removing from state");
                return Ok(None);
            }
            Err(e) => return Err(CloudError::api("reading", &resource, e)),
        };

        self.refresh(
            trust,
            prior.config.trust_password.clone(),
            prior.config.delete_associated_conditional_forwarder,
        )
        .await
        .map(Some)
    }

    async fn update(&self, prior: &TrustModel, config: &TrustConfig) -> Result<TrustModel> {
        config.validate()?;
        let resource = Self::resource_ref(&prior.id);

        let fields = prior.config.replacement_fields(config);
        if !fields.is_empty() {
            return Err(CloudError::RequiresReplacement { resource, fields });
        }

        if prior.config.selective_auth != config.selective_auth {
            tracing::info!(
                resource = %resource,
                selective_auth = config.selective_auth.as_str(),
                "Updating selective authentication"
            );
            self.api
                .update_trust(&prior.id, config.selective_auth)
                .await
                .map_err(|e| CloudError::api("updating", &resource, e))?;

            let spec = self
                .poll_spec(&prior.id, self.timeouts.update)
                .success([TrustState::Verified, TrustState::VerifyFailed])
                .failure([TrustState::UpdateFailed, TrustState::Failed]);
            let directory_id = config.directory_id.as_str();
            let id = prior.id.as_str();
            wait_for("waiting for update of", &spec, &self.cancel, move || {
                self.find_trust_by_id(directory_id, id)
            })
            .await?;
        }

        if prior.config.conditional_forwarder_ip_addrs != config.conditional_forwarder_ip_addrs {
            tracing::info!(
                resource = %resource,
                addrs = ?config.conditional_forwarder_ip_addrs,
                "Updating conditional forwarder"
            );
            self.api
                .update_conditional_forwarder(
                    &config.directory_id,
                    &config.remote_domain_name,
                    &config.conditional_forwarder_ip_addrs,
                )
                .await
                .map_err(|e| CloudError::api("updating conditional forwarder of", &resource, e))?;
        }

        let trust = self
            .find_trust_by_id(&config.directory_id, &prior.id)
            .await
            .map_err(|e| CloudError::api("reading", &resource, e))?;
        self.refresh(
            trust,
            config.trust_password.clone(),
            config.delete_associated_conditional_forwarder,
        )
        .await
    }

    async fn delete(&self, state: &TrustModel) -> Result<()> {
        let resource = Self::resource_ref(&state.id);
        tracing::info!(resource = %resource, "Deleting trust");

        match self
            .api
            .delete_trust(&state.id, state.config.delete_associated_conditional_forwarder)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(resource = %resource, "Trust already gone");
                return Ok(());
            }
            Err(e) => return Err(CloudError::api("deleting", &resource, e)),
        }

        let spec = self
            .poll_spec(&state.id, self.timeouts.delete)
            .success([TrustState::Deleted])
            .failure([TrustState::Failed])
            .gone_when_not_found();
        let directory_id = state.config.directory_id.as_str();
        let id = state.id.as_str();
        wait_for("waiting for deletion of", &spec, &self.cancel, move || {
            self.find_trust_by_id(directory_id, id)
        })
        .await?;

        tracing::info!(resource = %resource, "Deleted trust");
        Ok(())
    }

    /// Accepts `directory_id/trust_id` or `directory_id/remote_domain_name`
    async fn import(&self, import_id: &str) -> Result<TrustModel> {
        let (directory_id, key) = import_id
            .split_once('/')
            .filter(|(d, k)| !d.is_empty() && !k.is_empty())
            .ok_or_else(|| {
                CloudError::InvalidConfig(format!(
                    "unexpected import ID {:?}, expected DIRECTORY_ID/TRUST_ID or DIRECTORY_ID/REMOTE_DOMAIN_NAME",
                    import_id
                ))
            })?;

        let found = if key.starts_with("t-") {
            self.find_trust_by_id(directory_id, key).await
        } else {
            self.find_trust_by_domain(directory_id, key).await
        };
        let trust = found.map_err(|e| CloudError::api("importing", &Self::resource_ref(key), e))?;

        // The password cannot be read back
        self.refresh(trust, String::new(), false).await
    }
}
