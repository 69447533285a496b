use super::{sdk_error, unknown_value};
use crate::servicecatalog::{
    ProvisionedProduct, ProvisionedProductStatus, Record, RecordStatus, ServiceCatalogApi,
};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_servicecatalog::types::{RecordDetail, Tag};
use aws_sdk_servicecatalog::Client;
use stratus_cloud::{ApiError, TagSet};

/// [`ServiceCatalogApi`] over `aws-sdk-servicecatalog`
///
/// Provisioned product tags are read from the product's last provisioning
/// record, which is where the service reports them.
#[derive(Clone)]
pub struct ServiceCatalogClient {
    client: Client,
}

impl ServiceCatalogClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    async fn record_detail(&self, record_id: &str) -> Result<RecordDetail, ApiError> {
        let output = self
            .client
            .describe_record()
            .id(record_id)
            .send()
            .await
            .map_err(sdk_error)?;
        output
            .record_detail()
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("record {} has no detail", record_id)))
    }
}

fn record_tags(detail: &RecordDetail) -> TagSet {
    detail
        .record_tags()
        .iter()
        .filter_map(|t| Some((t.key()?, t.value()?)))
        .collect()
}

#[async_trait]
impl ServiceCatalogApi for ServiceCatalogClient {
    async fn describe_provisioned_product(&self, id: &str) -> Result<ProvisionedProduct, ApiError> {
        let output = self
            .client
            .describe_provisioned_product()
            .id(id)
            .send()
            .await
            .map_err(sdk_error)?;
        let detail = output
            .provisioned_product_detail()
            .ok_or_else(|| ApiError::not_found(format!("provisioned product {} not found", id)))?;

        let status = match detail.status().map(|s| s.as_str()).unwrap_or("") {
            "AVAILABLE" => ProvisionedProductStatus::Available,
            "UNDER_CHANGE" => ProvisionedProductStatus::UnderChange,
            "TAINTED" => ProvisionedProductStatus::Tainted,
            "ERROR" => ProvisionedProductStatus::Error,
            "PLAN_IN_PROGRESS" => ProvisionedProductStatus::PlanInProgress,
            other => return Err(unknown_value("provisioned product status", other)),
        };

        let tags = match detail.last_provisioning_record_id() {
            Some(record_id) => record_tags(&self.record_detail(record_id).await?),
            None => TagSet::new(),
        };

        Ok(ProvisionedProduct {
            id: detail.id().unwrap_or(id).to_string(),
            name: detail.name().unwrap_or_default().to_string(),
            status,
            status_message: detail.status_message().map(str::to_string),
            last_record_id: detail.last_record_id().map(str::to_string),
            tags,
        })
    }

    async fn update_provisioned_product_tags(&self, id: &str, tags: &TagSet) -> Result<String, ApiError> {
        let output = self
            .client
            .describe_provisioned_product()
            .id(id)
            .send()
            .await
            .map_err(sdk_error)?;
        let detail = output
            .provisioned_product_detail()
            .ok_or_else(|| ApiError::not_found(format!("provisioned product {} not found", id)))?;

        let tags = tags
            .iter()
            .map(|(k, v)| {
                Tag::builder()
                    .key(k)
                    .value(v)
                    .build()
                    .map_err(|e| ApiError::fatal(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .update_provisioned_product()
            .provisioned_product_id(id)
            .set_product_id(detail.product_id().map(str::to_string))
            .set_provisioning_artifact_id(detail.provisioning_artifact_id().map(str::to_string))
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(sdk_error)?;

        output
            .record_detail()
            .and_then(|r| r.record_id())
            .map(str::to_string)
            .ok_or_else(|| ApiError::fatal("UpdateProvisionedProduct returned no record ID"))
    }

    async fn describe_record(&self, record_id: &str) -> Result<Record, ApiError> {
        let detail = self.record_detail(record_id).await?;
        let status = match detail.status().map(|s| s.as_str()).unwrap_or("") {
            "CREATED" => RecordStatus::Created,
            "IN_PROGRESS" => RecordStatus::InProgress,
            "IN_PROGRESS_IN_ERROR" => RecordStatus::InProgressInError,
            "SUCCEEDED" => RecordStatus::Succeeded,
            "FAILED" => RecordStatus::Failed,
            other => return Err(unknown_value("record status", other)),
        };

        Ok(Record {
            record_id: record_id.to_string(),
            status,
            errors: detail
                .record_errors()
                .iter()
                .filter_map(|e| e.description().map(str::to_string))
                .collect(),
        })
    }
}
