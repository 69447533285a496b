//! AWS Directory Service

pub mod trust;

pub use trust::{
    DirectoryServiceApi, SelectiveAuth, Trust, TrustConfig, TrustDirection, TrustModel,
    TrustResource, TrustState, TrustType,
};
