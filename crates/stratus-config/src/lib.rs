//! Stratus provider configuration
//!
//! Locates and loads the provider configuration file (default tags, ignored
//! tag keys, per-resource timeouts) and overlays environment variables.

pub mod error;
pub mod provider;

pub use error::*;
pub use provider::{IgnoreTagsConfig, ProviderConfig, TimeoutOverrides};

use std::path::PathBuf;

/// Environment variable pointing directly at a configuration file
pub const CONFIG_PATH_ENV: &str = "STRATUS_CONFIG_PATH";

/// Prefix shared by every variable this crate reads
pub const ENV_PREFIX: &str = "STRATUS_";

const CANDIDATES: [&str; 4] = [
    "stratus.local.yaml",
    ".stratus.local.yaml",
    "stratus.yaml",
    ".stratus.yaml",
];

/// Get the Stratus configuration directory (`~/.config/stratus`)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stratus");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the provider configuration file
///
/// Search order:
/// 1. `STRATUS_CONFIG_PATH` (direct path)
/// 2. current directory: stratus.local.yaml, .stratus.local.yaml, stratus.yaml, .stratus.yaml
/// 3. the `./.stratus/` directory, same order
/// 4. `~/.config/stratus/config.yaml` (global)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let stratus_dir = current_dir.join(".stratus");
    if stratus_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = stratus_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stratus").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Load the provider configuration
///
/// A missing file is not an error: the defaults are used. Environment
/// overrides are applied in both cases.
pub fn load_provider_config() -> Result<ProviderConfig> {
    let config = match find_config_file() {
        Ok(path) => ProviderConfig::from_file(&path)?,
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No provider configuration file found, using defaults");
            ProviderConfig::default()
        }
        Err(e) => return Err(e),
    };

    config.with_env_overrides(stratus_env_vars()?)
}

/// `STRATUS_*` variables of the current process
///
/// Variables outside the prefix are skipped without decoding them. A
/// non-UTF-8 value under the prefix is an error.
pub fn stratus_env_vars() -> Result<Vec<(String, String)>> {
    let mut vars = Vec::new();
    for (name, value) in std::env::vars_os() {
        let Some(name) = name.to_str().filter(|n| n.starts_with(ENV_PREFIX)) else {
            continue;
        };
        let value = value.into_string().map_err(|_| ConfigError::InvalidEnv {
            var: name.to_string(),
            message: "value is not valid UTF-8".to_string(),
        })?;
        vars.push((name.to_string(), value));
    }
    Ok(vars)
}
