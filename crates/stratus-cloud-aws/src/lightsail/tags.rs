//! Lightsail tag conversions and in-place tag updates

use serde::{Deserialize, Serialize};
use stratus_cloud::{reconcile, ResourceRef, Result, TagApi, TagSet};

pub const TYPE_NAME: &str = "Lightsail Resource";

/// Tag as the Lightsail API models it; the value is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// Service tags from a tag set
pub fn lightsail_tags(tags: &TagSet) -> Vec<Tag> {
    tags.iter().map(|(k, v)| Tag::new(k, v)).collect()
}

/// Tag set from service tags
///
/// Lossy: a tag without a value and a tag with an empty value both become
/// `""`, since a tag set holds strings only. A remote tag without a value
/// therefore matches a desired empty value and is never rewritten. Callers
/// that need to tell them apart read [`Tag::value`] directly.
pub fn key_value_tags(tags: &[Tag]) -> TagSet {
    tags.iter()
        .map(|t| (t.key.as_str(), t.value.as_deref().unwrap_or_default()))
        .collect()
}

/// Move a resource's tags from `old` to `new`
///
/// Removed keys are untagged first, then new and changed tags applied.
/// `aws:` keys are left alone in both directions.
pub async fn update_tags<A>(api: &A, identifier: &str, old: &TagSet, new: &TagSet) -> Result<()>
where
    A: TagApi + ?Sized,
{
    let delta = reconcile(old, new);
    stratus_cloud::update_tags(api, &ResourceRef::new(TYPE_NAME, identifier), identifier, &delta, false)
        .await
}
