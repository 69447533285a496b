//! Adapters from the service API traits to the AWS SDK clients
//!
//! Compiled with the `sdk` feature only.

pub mod ds;
pub mod lightsail;
pub mod networkfirewall;
pub mod securityhub;
pub mod servicecatalog;

use crate::error::api_error;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_securityhub::error::{DisplayErrorContext, ProvideErrorMetadata};
use chrono::{DateTime, Utc};
use stratus_cloud::ApiError;
use stratus_config::ProviderConfig;

pub use ds::DirectoryServiceClient;
pub use lightsail::LightsailClient;
pub use networkfirewall::NetworkFirewallClient;
pub use securityhub::SecurityHubClient;
pub use servicecatalog::ServiceCatalogClient;

/// Load shared SDK configuration, honouring the configured region
pub async fn load_sdk_config(config: &ProviderConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    loader.load().await
}

/// Classify an SDK error by its service error code
///
/// Errors without a code (dispatch failures, timeouts) are transient.
pub(crate) fn sdk_error<E>(err: E) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match err.code() {
        Some(code) => api_error(code, err.message().unwrap_or_default()),
        None => ApiError::retryable(DisplayErrorContext(&err).to_string()),
    }
}

/// An enum value the service returned that this crate does not know
pub(crate) fn unknown_value(field: &str, value: &str) -> ApiError {
    ApiError::fatal(format!("unexpected {} {:?} in response", field, value))
}

pub(crate) fn to_chrono(time: &aws_sdk_directory::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}
