//! Tag reconciliation
//!
//! Computes the minimal set of tag additions and removals that moves a
//! resource's remote tags to the effective ("merged") tags: provider default
//! tags overlaid by the tags declared on the resource.
//!
//! Keys under the platform prefix `aws:` are owned by the platform and are
//! never added or removed. Provider configuration may name more keys to
//! leave alone, see [`IgnoreTags`].

use crate::error::{ApiError, CloudError, Result};
use crate::resource::ResourceRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use stratus_config::{IgnoreTagsConfig, ProviderConfig};

/// Prefix of platform-owned tag keys
pub const SYSTEM_TAG_PREFIX: &str = "aws:";

/// Immutable key/value tag snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tag set from values that may be null
    ///
    /// A null value means the tag is not set at this level, so the key is
    /// dropped and any provider default for it still applies.
    pub fn from_nullable<I, K>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        tags.into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.into(), v)))
            .collect()
    }

    /// Copy of this set with one more tag
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tags = self.0.clone();
        tags.insert(key.into(), value.into());
        Self(tags)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Overlay `desired` on top of these (default) tags; desired wins
    pub fn overlay(&self, desired: &TagSet) -> TagSet {
        let mut merged = self.0.clone();
        merged.extend(desired.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Drop tags that are identical to a provider default
    ///
    /// Used to recover the resource-level tags from the effective tags
    /// observed on the resource. Keys that overlap a default with a
    /// different value belong to the resource and are kept.
    pub fn remove_defaults(&self, defaults: &TagSet) -> TagSet {
        self.0
            .iter()
            .filter(|(k, v)| defaults.get(k) != Some(v.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Drop every tag the rules say to leave alone
    pub fn ignore(&self, rules: &IgnoreTags) -> TagSet {
        self.0
            .iter()
            .filter(|(k, _)| !rules.is_ignored(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Drop platform-owned (`aws:`) tags
    pub fn ignore_system(&self) -> TagSet {
        self.ignore(&IgnoreTags::default())
    }

    /// Reject zero-length tag values for resources that do not support them
    pub fn ensure_no_empty_values(&self, resource: &ResourceRef) -> Result<()> {
        let empty: Vec<&str> = self
            .0
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect();

        if empty.is_empty() {
            Ok(())
        } else {
            Err(CloudError::InvalidConfig(format!(
                "{} does not support empty tag values (keys: {})",
                resource,
                empty.join(", ")
            )))
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(tags: BTreeMap<String, String>) -> Self {
        Self(tags)
    }
}

/// Tag keys that are never managed
///
/// The platform prefix is always ignored; configured keys and prefixes are
/// ignored in addition to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreTags {
    keys: BTreeSet<String>,
    key_prefixes: Vec<String>,
}

impl IgnoreTags {
    pub fn new<K, P>(keys: K, key_prefixes: P) -> Self
    where
        K: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        Self {
            keys: keys.into_iter().collect(),
            key_prefixes: key_prefixes.into_iter().collect(),
        }
    }

    pub fn from_config(config: &IgnoreTagsConfig) -> Self {
        Self::new(config.keys.iter().cloned(), config.key_prefixes.iter().cloned())
    }

    pub fn is_ignored(&self, key: &str) -> bool {
        key.starts_with(SYSTEM_TAG_PREFIX)
            || self.keys.contains(key)
            || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Changes needed to move remote tags to the merged tags
///
/// Additions and removals never share a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    /// Tags to create or overwrite
    pub additions: TagSet,
    /// Keys to delete
    pub removals: BTreeSet<String>,
}

impl TagDelta {
    /// Nothing to do; callers skip the tagging calls entirely
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Diff the remote tags against the merged tags, leaving `aws:` keys alone
pub fn reconcile(remote: &TagSet, merged: &TagSet) -> TagDelta {
    reconcile_with(remote, merged, &IgnoreTags::default())
}

/// Diff the remote tags against the merged tags, leaving ignored keys alone
pub fn reconcile_with(remote: &TagSet, merged: &TagSet, ignore: &IgnoreTags) -> TagDelta {
    let additions = merged
        .iter()
        .filter(|(k, _)| !ignore.is_ignored(k))
        .filter(|(k, v)| remote.get(k) != Some(*v))
        .collect();

    let removals = remote
        .keys()
        .filter(|k| !ignore.is_ignored(k))
        .filter(|k| !merged.contains_key(k))
        .map(str::to_string)
        .collect();

    TagDelta {
        additions,
        removals,
    }
}

/// Resource-level and effective tags as observed on a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTags {
    /// Tags that belong to the resource configuration
    pub tags: TagSet,
    /// Every managed tag, provider defaults included
    pub tags_all: TagSet,
}

/// Provider-level tag settings, passed explicitly into every tagging call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagContext {
    defaults: TagSet,
    ignore: IgnoreTags,
}

impl TagContext {
    pub fn new(defaults: TagSet, ignore: IgnoreTags) -> Self {
        Self { defaults, ignore }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            TagSet::from(config.default_tags.clone()),
            IgnoreTags::from_config(&config.ignore_tags),
        )
    }

    pub fn defaults(&self) -> &TagSet {
        &self.defaults
    }

    pub fn ignore_rules(&self) -> &IgnoreTags {
        &self.ignore
    }

    /// Effective tags for a resource: defaults overlaid by `desired`
    pub fn merged(&self, desired: &TagSet) -> TagSet {
        self.defaults.overlay(desired)
    }

    /// Delta moving `remote` to the effective tags for `desired`
    pub fn reconcile(&self, remote: &TagSet, desired: &TagSet) -> TagDelta {
        reconcile_with(remote, &self.merged(desired), &self.ignore)
    }

    /// Split tags read from a resource into resource-level and effective tags
    pub fn observe(&self, remote: &TagSet) -> ResourceTags {
        let tags_all = remote.ignore(&self.ignore);
        let tags = tags_all.remove_defaults(&self.defaults);
        ResourceTags { tags, tags_all }
    }
}

/// Remote tagging calls of a service
#[async_trait]
pub trait TagApi: Send + Sync {
    /// Create or overwrite tags
    async fn tag_resource(&self, identifier: &str, tags: &TagSet) -> std::result::Result<(), ApiError>;

    /// Delete tag keys
    async fn untag_resource(
        &self,
        identifier: &str,
        keys: &BTreeSet<String>,
    ) -> std::result::Result<(), ApiError>;
}

/// Apply a tag delta: one removal call, then one tagging call
///
/// An empty side of the delta issues no call. When `deleting` is set the
/// resource is being torn down concurrently and a not-found response is
/// treated as done.
pub async fn update_tags<A>(
    api: &A,
    resource: &ResourceRef,
    identifier: &str,
    delta: &TagDelta,
    deleting: bool,
) -> Result<()>
where
    A: TagApi + ?Sized,
{
    if delta.is_empty() {
        tracing::debug!(resource = %resource, "Tags already up to date");
        return Ok(());
    }

    if !delta.removals.is_empty() {
        tracing::debug!(resource = %resource, keys = ?delta.removals, "Removing tags");
        match api.untag_resource(identifier, &delta.removals).await {
            Ok(()) => {}
            Err(e) if deleting && e.is_not_found() => {
                tracing::debug!(resource = %resource, "Resource gone while untagging");
                return Ok(());
            }
            Err(e) => return Err(CloudError::api("untagging", resource, e)),
        }
    }

    if !delta.additions.is_empty() {
        tracing::debug!(resource = %resource, count = delta.additions.len(), "Applying tags");
        match api.tag_resource(identifier, &delta.additions).await {
            Ok(()) => {}
            Err(e) if deleting && e.is_not_found() => {
                tracing::debug!(resource = %resource, "Resource gone while tagging");
            }
            Err(e) => return Err(CloudError::api("tagging", resource, e)),
        }
    }

    Ok(())
}
