//! Provider-level settings shared by every resource

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Prefix of variables that contribute default tags (`STRATUS_DEFAULT_TAGS_<key>`)
pub const DEFAULT_TAGS_ENV_PREFIX: &str = "STRATUS_DEFAULT_TAGS_";
/// Comma separated tag keys to ignore
pub const IGNORE_TAGS_KEYS_ENV: &str = "STRATUS_IGNORE_TAGS_KEYS";
/// Comma separated tag key prefixes to ignore
pub const IGNORE_TAGS_KEY_PREFIXES_ENV: &str = "STRATUS_IGNORE_TAGS_KEY_PREFIXES";

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Region resources are managed in
    pub region: Option<String>,

    /// Partition used when building ARNs (e.g. "aws", "aws-cn")
    pub partition: String,

    /// Account the credentials belong to
    pub account_id: Option<String>,

    /// Tags applied to every resource that supports tagging
    pub default_tags: BTreeMap<String, String>,

    /// Tags that are never managed
    pub ignore_tags: IgnoreTagsConfig,

    /// Per-resource-type timeout overrides, keyed by resource type name
    /// (e.g. "directory_service_trust")
    pub timeouts: BTreeMap<String, TimeoutOverrides>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: None,
            partition: "aws".to_string(),
            account_id: None,
            default_tags: BTreeMap::new(),
            ignore_tags: IgnoreTagsConfig::default(),
            timeouts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreTagsConfig {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

/// Optional overrides of a resource's create/update/delete wait budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutOverrides {
    #[serde(with = "humantime_serde::option")]
    pub create: Option<Duration>,
    #[serde(with = "humantime_serde::option")]
    pub update: Option<Duration>,
    #[serde(with = "humantime_serde::option")]
    pub delete: Option<Duration>,
}

impl ProviderConfig {
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content, path)?;
        tracing::debug!(
            "Loaded provider configuration from {} ({} default tags)",
            path.display(),
            config.default_tags.len()
        );
        Ok(config)
    }

    /// Overlay environment variables on top of the file configuration
    ///
    /// Default tags from the environment win over the file; ignore lists are
    /// extended, not replaced.
    pub fn with_env_overrides<I>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(DEFAULT_TAGS_ENV_PREFIX) {
                if key.is_empty() {
                    return Err(ConfigError::InvalidEnv {
                        var: name.clone(),
                        message: "tag key must not be empty".to_string(),
                    });
                }
                self.default_tags.insert(key.to_string(), value);
            } else if name == IGNORE_TAGS_KEYS_ENV {
                self.ignore_tags.keys.extend(split_list(&value));
            } else if name == IGNORE_TAGS_KEY_PREFIXES_ENV {
                self.ignore_tags.key_prefixes.extend(split_list(&value));
            }
        }
        Ok(self)
    }

    /// Timeout overrides for a resource type, if configured
    pub fn timeouts_for(&self, resource_type: &str) -> TimeoutOverrides {
        self.timeouts.get(resource_type).copied().unwrap_or_default()
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
