//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Runtime config (~/.bt/bt-runtime.yaml)
//! 3. Environment variables (BT_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{RetryPoliciesConfig, RuntimeConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const RUNTIME_CONFIG_FILE: &str = "bt-runtime.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at the standard config directory (~/.bt)
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    fn default_config_dir() -> Result<Utf8PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Home directory is not UTF-8: {:?}", p)))?;

        Ok(home.join(".bt"))
    }

    /// Load runtime configuration with hierarchical precedence
    ///
    /// A missing config directory or file is not an error; the embedded
    /// defaults apply.
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = Self::load_embedded_config::<RuntimeConfig>("runtime-defaults.yaml")?;

        let runtime_config_path = self.config_dir.join(RUNTIME_CONFIG_FILE);
        if runtime_config_path.exists() {
            debug!("Loading runtime config from {}", runtime_config_path);
            let file_config = self.load_yaml_file::<RuntimeConfig>(&runtime_config_path)?;
            config = Self::merge_runtime_config(config, file_config);
        }

        Self::apply_env_overrides(config)
    }

    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Merge two runtime configs (base is overridden by overlay)
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            network: overlay.network,
            retry_policies: Self::merge_retry_policies(base.retry_policies, overlay.retry_policies),
            hosting: overlay.hosting,
            install: overlay.install,
        }
    }

    fn merge_retry_policies(
        mut base: RetryPoliciesConfig,
        overlay: RetryPoliciesConfig,
    ) -> RetryPoliciesConfig {
        for (key, policy) in overlay.operations {
            base.operations.insert(key, policy);
        }
        base.default = overlay.default;
        base
    }

    fn apply_env_overrides(mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Ok(val) = env::var("BT_HTTP_TIMEOUT_SECS") {
            config.network.http_timeout_secs = parse_number("BT_HTTP_TIMEOUT_SECS", &val)?;
        }

        if let Ok(val) = env::var("BT_DOWNLOAD_TIMEOUT_SECS") {
            config.network.download_timeout_secs =
                parse_number("BT_DOWNLOAD_TIMEOUT_SECS", &val)?;
        }

        if let Ok(val) = env::var("BT_OPERATION_TIMEOUT_SECS") {
            config.network.operation_timeout_secs =
                Some(parse_number("BT_OPERATION_TIMEOUT_SECS", &val)?);
        }

        if let Ok(val) = env::var("BT_GITHUB_API_URL") {
            config.hosting.api_url = val;
        }

        if let Ok(val) = env::var("BT_DOWNLOAD_URL") {
            config.hosting.download_url = val;
        }

        if let Ok(val) = env::var("BT_GITHUB_REPO_OWNER") {
            config.hosting.repo_owner = val;
        }

        if let Ok(val) = env::var("BT_GITHUB_REPO_NAME") {
            config.hosting.repo_name = val;
        }

        if let Ok(val) = env::var("BT_TOKEN_ENV") {
            config.hosting.token_env = val;
        }

        if let Ok(val) = env::var("BT_KEEP_BACKUP") {
            config.install.keep_backup = parse_flag("BT_KEEP_BACKUP", &val)?;
        }

        if let Ok(val) = env::var("BT_VERIFY_BINARY") {
            config.install.verify_binary = parse_flag("BT_VERIFY_BINARY", &val)?;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, val: &str) -> Result<T> {
    val.trim()
        .parse()
        .map_err(|_| Error::invalid_config(format!("{} must be a valid number", var)))
}

fn parse_flag(var: &str, val: &str) -> Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_config(format!("{} must be true or false", var))),
    }
}
