//! AWS Network Firewall

pub mod resource_policy;

pub use resource_policy::{
    NetworkFirewallApi, ResourcePolicyConfig, ResourcePolicyModel, ResourcePolicyResource,
};
