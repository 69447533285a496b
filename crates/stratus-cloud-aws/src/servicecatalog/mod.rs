//! AWS Service Catalog

pub mod provisioned_product;

pub use provisioned_product::{
    ProvisionedProduct, ProvisionedProductStatus, ProvisionedProductTags, Record, RecordStatus,
    ServiceCatalogApi,
};
