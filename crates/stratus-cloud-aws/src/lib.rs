//! AWS resources for Stratus
//!
//! Each resource is written against a small async trait describing the
//! service calls it makes ([`ds::DirectoryServiceApi`],
//! [`securityhub::SecurityHubApi`], ...). The `sdk` feature provides
//! implementations of those traits over the AWS SDK clients.
//!
//! # Resources
//!
//! - Directory Service trust relationships (`ds::trust`)
//! - Network Firewall resource policies (`networkfirewall::resource_policy`)
//! - Security Hub account enablement (`securityhub::account`)
//! - Service Catalog provisioned product tags (`servicecatalog::provisioned_product`)
//! - Lightsail tag updates (`lightsail::tags`)
//!
//! # Example
//!
//! ```ignore
//! use stratus_cloud::Resource;
//! use stratus_cloud_aws::{sdk, AwsProvider};
//! use std::sync::Arc;
//!
//! let provider = AwsProvider::from_config_file()?;
//! let sdk_config = sdk::load_sdk_config(provider.config()).await;
//! let account = provider.securityhub_account(Arc::new(sdk::SecurityHubClient::new(&sdk_config)))?;
//!
//! let state = account.create(&Default::default()).await?;
//! println!("Security Hub enabled: {}", state.arn);
//! ```

pub mod arn;
pub mod ds;
pub mod error;
pub mod lightsail;
pub mod networkfirewall;
pub mod policy;
pub mod provider;
#[cfg(feature = "sdk")]
pub mod sdk;
pub mod securityhub;
pub mod servicecatalog;

pub use arn::Arn;
pub use error::{api_error, classify};
pub use provider::{AccountScope, AwsProvider};
