//! ARN parsing

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use stratus_cloud::CloudError;

static ARN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:(aws[a-z-]*):([a-z0-9-]+):([a-z0-9-]*):(\d{12})?:(.+)$")
        .expect("ARN pattern is valid")
});

/// Amazon Resource Name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn new(
        partition: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            service: service.into(),
            region: region.into(),
            account_id: account_id.into(),
            resource: resource.into(),
        }
    }
}

impl FromStr for Arn {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ARN_PATTERN
            .captures(s)
            .ok_or_else(|| CloudError::InvalidConfig(format!("invalid ARN: {:?}", s)))?;
        let part = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();

        Ok(Self {
            partition: part(1),
            service: part(2),
            region: part(3),
            account_id: part(4),
            resource: part(5),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}
