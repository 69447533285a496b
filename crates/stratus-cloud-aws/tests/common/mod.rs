//! In-memory service fakes
//!
//! Each fake keeps just enough state to behave like the real service over a
//! few polls: remote objects move through scripted states, one step per
//! describe call.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use stratus_cloud::{ApiError, TagSet};
use stratus_cloud_aws::api_error;
use stratus_cloud_aws::ds::{
    DirectoryServiceApi, SelectiveAuth, Trust, TrustConfig, TrustState,
};
use stratus_cloud_aws::networkfirewall::NetworkFirewallApi;
use stratus_cloud_aws::securityhub::{ControlFindingGenerator, Hub, SecurityHubApi};
use stratus_cloud_aws::servicecatalog::{
    ProvisionedProduct, ProvisionedProductStatus, Record, RecordStatus, ServiceCatalogApi,
};

pub const DIRECTORY_ID: &str = "d-926724cf57";
pub const ACCOUNT_ID: &str = "123456789012";
pub const VERIFY_FAILED_REASON: &str =
    "The specified domain either does not exist or could not be contacted.";

fn record(calls: &Mutex<Vec<String>>, call: String) {
    calls.lock().unwrap().push(call);
}

// ---------------------------------------------------------------------------
// Directory Service

enum Step {
    State(TrustState, Option<String>),
    Remove,
}

pub struct FakeDirectoryService {
    trusts: Mutex<Vec<Trust>>,
    script: Mutex<VecDeque<Step>>,
    outcome: Mutex<(TrustState, Option<String>)>,
    forwarders: Mutex<BTreeMap<String, BTreeSet<String>>>,
    next_id: AtomicU32,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDirectoryService {
    /// The remote domain knows nothing about us; verification fails
    pub fn one_sided() -> Self {
        Self::with_outcome(TrustState::VerifyFailed, Some(VERIFY_FAILED_REASON))
    }

    /// Both sides are configured; verification succeeds
    pub fn bidirectional() -> Self {
        Self::with_outcome(TrustState::Verified, None)
    }

    /// Verification settles on `state`
    pub fn with_outcome(state: TrustState, reason: Option<&str>) -> Self {
        Self {
            trusts: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            outcome: Mutex::new((state, reason.map(str::to_string))),
            forwarders: Mutex::new(BTreeMap::new()),
            next_id: AtomicU32::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn trust(&self, trust_id: &str) -> Option<Trust> {
        self.trusts
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.trust_id == trust_id)
            .cloned()
    }

    /// Someone deleted the trust outside of our control
    pub fn remove_trust(&self, trust_id: &str) {
        self.trusts.lock().unwrap().retain(|t| t.trust_id != trust_id);
    }

    pub fn forwarder_ips(&self, remote_domain_name: &str) -> BTreeSet<String> {
        self.forwarders
            .lock()
            .unwrap()
            .get(remote_domain_name)
            .cloned()
            .unwrap_or_default()
    }

    fn converge(&self, mut steps: Vec<Step>) {
        let (state, reason) = self.outcome.lock().unwrap().clone();
        steps.push(Step::State(state, reason));
        *self.script.lock().unwrap() = steps.into();
    }

    fn not_found(trust_id: &str) -> ApiError {
        api_error(
            "EntityDoesNotExistException",
            format!("Trust {} does not exist", trust_id),
        )
    }
}

#[async_trait]
impl DirectoryServiceApi for FakeDirectoryService {
    async fn create_trust(&self, config: &TrustConfig) -> Result<String, ApiError> {
        record(&self.calls, format!("create_trust {}", config.remote_domain_name));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let trust_id = format!("t-{:010}", n);

        self.trusts.lock().unwrap().push(Trust {
            directory_id: config.directory_id.clone(),
            trust_id: trust_id.clone(),
            remote_domain_name: config.remote_domain_name.clone(),
            trust_direction: config.trust_direction,
            trust_type: config.trust_type,
            selective_auth: Some(config.selective_auth),
            trust_state: TrustState::Creating,
            trust_state_reason: None,
            created_date_time: Some(chrono::Utc::now()),
            last_updated_date_time: Some(chrono::Utc::now()),
            state_last_updated_date_time: Some(chrono::Utc::now()),
        });
        if !config.conditional_forwarder_ip_addrs.is_empty() {
            self.forwarders.lock().unwrap().insert(
                config.remote_domain_name.clone(),
                config.conditional_forwarder_ip_addrs.clone(),
            );
        }
        self.converge(vec![
            Step::State(TrustState::Created, None),
            Step::State(TrustState::Verifying, None),
        ]);
        Ok(trust_id)
    }

    async fn describe_trusts(&self, directory_id: &str) -> Result<Vec<Trust>, ApiError> {
        if directory_id != DIRECTORY_ID {
            return Err(api_error(
                "EntityDoesNotExistException",
                format!("Directory {} does not exist", directory_id),
            ));
        }

        let mut trusts = self.trusts.lock().unwrap();
        if let Some(step) = self.script.lock().unwrap().pop_front() {
            match step {
                Step::State(state, reason) => {
                    if let Some(trust) = trusts.last_mut() {
                        trust.trust_state = state;
                        trust.trust_state_reason = reason;
                    }
                }
                Step::Remove => {
                    trusts.pop();
                }
            }
        }
        Ok(trusts.clone())
    }

    async fn update_trust(&self, trust_id: &str, selective_auth: SelectiveAuth) -> Result<(), ApiError> {
        record(
            &self.calls,
            format!("update_trust {} {}", trust_id, selective_auth.as_str()),
        );
        {
            let mut trusts = self.trusts.lock().unwrap();
            let trust = trusts
                .iter_mut()
                .find(|t| t.trust_id == trust_id)
                .ok_or_else(|| Self::not_found(trust_id))?;
            trust.selective_auth = Some(selective_auth);
        }
        self.converge(vec![
            Step::State(TrustState::Updating, None),
            Step::State(TrustState::Updated, None),
        ]);
        Ok(())
    }

    async fn delete_trust(
        &self,
        trust_id: &str,
        delete_associated_conditional_forwarder: bool,
    ) -> Result<(), ApiError> {
        record(&self.calls, format!("delete_trust {}", trust_id));
        let domain = self
            .trust(trust_id)
            .ok_or_else(|| Self::not_found(trust_id))?
            .remote_domain_name;
        if delete_associated_conditional_forwarder {
            self.forwarders.lock().unwrap().remove(&domain);
        }
        *self.script.lock().unwrap() = VecDeque::from([
            Step::State(TrustState::Deleting, None),
            Step::State(TrustState::Deleting, None),
            Step::Remove,
        ]);
        Ok(())
    }

    async fn describe_conditional_forwarder(
        &self,
        _directory_id: &str,
        remote_domain_name: &str,
    ) -> Result<BTreeSet<String>, ApiError> {
        self.forwarders
            .lock()
            .unwrap()
            .get(remote_domain_name)
            .cloned()
            .ok_or_else(|| {
                api_error(
                    "EntityDoesNotExistException",
                    format!("No conditional forwarder for {}", remote_domain_name),
                )
            })
    }

    async fn update_conditional_forwarder(
        &self,
        _directory_id: &str,
        remote_domain_name: &str,
        dns_ip_addrs: &BTreeSet<String>,
    ) -> Result<(), ApiError> {
        record(
            &self.calls,
            format!("update_conditional_forwarder {}", remote_domain_name),
        );
        self.forwarders
            .lock()
            .unwrap()
            .insert(remote_domain_name.to_string(), dns_ip_addrs.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Network Firewall

pub const RAM_MESSAGE: &str = "The supplied policy does not match RAM managed permissions";

#[derive(Default)]
pub struct FakeNetworkFirewall {
    policies: Mutex<BTreeMap<String, String>>,
    /// Respond with an empty DescribeResourcePolicy output
    pub empty_policy: std::sync::atomic::AtomicBool,
    ram_rejections: AtomicU32,
    pub delete_attempts: AtomicU32,
}

impl FakeNetworkFirewall {
    /// Reject the next `n` deletes as if RAM had not caught up yet
    pub fn reject_deletes(&self, n: u32) {
        self.ram_rejections.store(n, Ordering::SeqCst);
    }

    pub fn set_remote_policy(&self, resource_arn: &str, policy: &str) {
        self.policies
            .lock()
            .unwrap()
            .insert(resource_arn.to_string(), policy.to_string());
    }

    pub fn remote_policy(&self, resource_arn: &str) -> Option<String> {
        self.policies.lock().unwrap().get(resource_arn).cloned()
    }

    fn not_found(resource_arn: &str) -> ApiError {
        api_error(
            "ResourceNotFoundException",
            format!("Resource {} has no policy", resource_arn),
        )
    }
}

#[async_trait]
impl NetworkFirewallApi for FakeNetworkFirewall {
    async fn put_resource_policy(&self, resource_arn: &str, policy: &str) -> Result<(), ApiError> {
        // The service stores its own rendering of the document
        let value: serde_json::Value = serde_json::from_str(policy)
            .map_err(|e| api_error("InvalidRequestException", e.to_string()))?;
        self.set_remote_policy(resource_arn, &serde_json::to_string_pretty(&value).unwrap());
        Ok(())
    }

    async fn describe_resource_policy(&self, resource_arn: &str) -> Result<Option<String>, ApiError> {
        let policy = self
            .remote_policy(resource_arn)
            .ok_or_else(|| Self::not_found(resource_arn))?;
        if self.empty_policy.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(policy))
    }

    async fn delete_resource_policy(&self, resource_arn: &str) -> Result<(), ApiError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        let rejecting = self
            .ram_rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejecting {
            return Err(api_error("InvalidResourcePolicyException", RAM_MESSAGE));
        }
        self.policies
            .lock()
            .unwrap()
            .remove(resource_arn)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(resource_arn))
    }
}

// ---------------------------------------------------------------------------
// Security Hub

pub const ADMIN_MESSAGE: &str =
    "Cannot disable Security Hub on the Security Hub administrator account while there are associated member accounts.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSettings {
    pub auto_enable_controls: bool,
    pub control_finding_generator: ControlFindingGenerator,
    pub enable_default_standards: bool,
}

#[derive(Default)]
pub struct FakeSecurityHub {
    hub: Mutex<Option<HubSettings>>,
    admin_rejections: AtomicU32,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSecurityHub {
    pub fn hub(&self) -> Option<HubSettings> {
        self.hub.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Reject the next `n` disables as if member accounts were still attached
    pub fn reject_disables(&self, n: u32) {
        self.admin_rejections.store(n, Ordering::SeqCst);
    }

    /// Someone disabled Security Hub outside of our control
    pub fn disable_externally(&self) {
        *self.hub.lock().unwrap() = None;
    }
}

fn generator_name(g: Option<ControlFindingGenerator>) -> &'static str {
    g.map_or("-", |g| g.as_str())
}

#[async_trait]
impl SecurityHubApi for FakeSecurityHub {
    async fn enable_security_hub(
        &self,
        enable_default_standards: bool,
        control_finding_generator: Option<ControlFindingGenerator>,
    ) -> Result<(), ApiError> {
        record(
            &self.calls,
            format!("enable {} {}", enable_default_standards, generator_name(control_finding_generator)),
        );
        let mut hub = self.hub.lock().unwrap();
        if hub.is_some() {
            return Err(api_error(
                "ResourceConflictException",
                "Account is already subscribed to Security Hub",
            ));
        }
        *hub = Some(HubSettings {
            auto_enable_controls: true,
            control_finding_generator: control_finding_generator
                .unwrap_or(ControlFindingGenerator::SecurityControl),
            enable_default_standards,
        });
        Ok(())
    }

    async fn update_security_hub_configuration(
        &self,
        auto_enable_controls: bool,
        control_finding_generator: Option<ControlFindingGenerator>,
    ) -> Result<(), ApiError> {
        record(
            &self.calls,
            format!("update {} {}", auto_enable_controls, generator_name(control_finding_generator)),
        );
        let mut hub = self.hub.lock().unwrap();
        let hub = hub.as_mut().ok_or_else(|| {
            api_error(
                "InvalidAccessException",
                format!("Account {} is not subscribed to AWS Security Hub", ACCOUNT_ID),
            )
        })?;
        hub.auto_enable_controls = auto_enable_controls;
        if let Some(g) = control_finding_generator {
            hub.control_finding_generator = g;
        }
        Ok(())
    }

    async fn describe_hub(&self, hub_arn: &str) -> Result<Option<Hub>, ApiError> {
        let hub = self.hub.lock().unwrap().clone().ok_or_else(|| {
            api_error(
                "InvalidAccessException",
                format!("Account {} is not subscribed to AWS Security Hub", ACCOUNT_ID),
            )
        })?;
        Ok(Some(Hub {
            hub_arn: hub_arn.to_string(),
            auto_enable_controls: hub.auto_enable_controls,
            control_finding_generator: Some(hub.control_finding_generator),
            subscribed_at: None,
        }))
    }

    async fn disable_security_hub(&self) -> Result<(), ApiError> {
        record(&self.calls, "disable".to_string());
        let rejecting = self
            .admin_rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejecting {
            return Err(api_error("InvalidInputException", ADMIN_MESSAGE));
        }
        self.hub
            .lock()
            .unwrap()
            .take()
            .map(|_| ())
            .ok_or_else(|| api_error("ResourceNotFoundException", "Security Hub is not enabled"))
    }
}

// ---------------------------------------------------------------------------
// Service Catalog

pub const PRODUCT_ID: &str = "pp-abcdefghijklm";

pub struct FakeServiceCatalog {
    product: Mutex<Option<ProvisionedProduct>>,
    record_script: Mutex<VecDeque<RecordStatus>>,
    product_script: Mutex<VecDeque<ProvisionedProductStatus>>,
    record_outcome: Mutex<(RecordStatus, Vec<String>)>,
    pub updates: Mutex<Vec<TagSet>>,
}

impl FakeServiceCatalog {
    pub fn with_tags(tags: TagSet) -> Self {
        Self {
            product: Mutex::new(Some(ProvisionedProduct {
                id: PRODUCT_ID.to_string(),
                name: "example".to_string(),
                status: ProvisionedProductStatus::Available,
                status_message: None,
                last_record_id: Some("rec-initial".to_string()),
                tags,
            })),
            record_script: Mutex::new(VecDeque::new()),
            product_script: Mutex::new(VecDeque::new()),
            record_outcome: Mutex::new((RecordStatus::Succeeded, Vec::new())),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn gone() -> Self {
        let fake = Self::with_tags(TagSet::new());
        *fake.product.lock().unwrap() = None;
        fake
    }

    /// Provisioning records from now on fail with these errors
    pub fn fail_records(&self, errors: &[&str]) {
        *self.record_outcome.lock().unwrap() = (
            RecordStatus::Failed,
            errors.iter().map(|e| e.to_string()).collect(),
        );
    }

    pub fn updates(&self) -> Vec<TagSet> {
        self.updates.lock().unwrap().clone()
    }

    fn not_found() -> ApiError {
        api_error(
            "ResourceNotFoundException",
            format!("Provisioned product {} not found", PRODUCT_ID),
        )
    }
}

/// Pop the next scripted status, holding on to the last one
fn next_status<S: Copy>(script: &Mutex<VecDeque<S>>, current: S) -> S {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap_or(current)
    } else {
        script.front().copied().unwrap_or(current)
    }
}

#[async_trait]
impl ServiceCatalogApi for FakeServiceCatalog {
    async fn describe_provisioned_product(&self, id: &str) -> Result<ProvisionedProduct, ApiError> {
        let mut product = self.product.lock().unwrap();
        let product = product
            .as_mut()
            .filter(|p| p.id == id)
            .ok_or_else(Self::not_found)?;
        product.status = next_status(&self.product_script, product.status);
        Ok(product.clone())
    }

    async fn update_provisioned_product_tags(&self, id: &str, tags: &TagSet) -> Result<String, ApiError> {
        let mut product = self.product.lock().unwrap();
        let product = product
            .as_mut()
            .filter(|p| p.id == id)
            .ok_or_else(Self::not_found)?;
        self.updates.lock().unwrap().push(tags.clone());

        let (outcome, _) = self.record_outcome.lock().unwrap().clone();
        let record_id = format!("rec-{}", self.updates.lock().unwrap().len());
        product.status = ProvisionedProductStatus::UnderChange;
        product.last_record_id = Some(record_id.clone());

        *self.record_script.lock().unwrap() =
            VecDeque::from([RecordStatus::Created, RecordStatus::InProgress, outcome]);
        if outcome == RecordStatus::Succeeded {
            product.tags = tags.clone();
            *self.product_script.lock().unwrap() = VecDeque::from([
                ProvisionedProductStatus::UnderChange,
                ProvisionedProductStatus::Available,
            ]);
        } else {
            product.status_message = Some("Update failed".to_string());
            *self.product_script.lock().unwrap() =
                VecDeque::from([ProvisionedProductStatus::Tainted]);
        }
        Ok(record_id)
    }

    async fn describe_record(&self, record_id: &str) -> Result<Record, ApiError> {
        let status = next_status(&self.record_script, RecordStatus::Created);
        let errors = if status == RecordStatus::Failed {
            self.record_outcome.lock().unwrap().1.clone()
        } else {
            Vec::new()
        };
        Ok(Record {
            record_id: record_id.to_string(),
            status,
            errors,
        })
    }
}
