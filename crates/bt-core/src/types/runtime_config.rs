//! Runtime configuration types for operational parameters
//!
//! These types define configuration that controls how bt talks to the
//! release host, how it retries, and how it installs new binaries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retry policy configurations
    #[serde(default)]
    pub retry_policies: RetryPoliciesConfig,

    /// Release hosting settings
    #[serde(default)]
    pub hosting: HostingConfig,

    /// Self-install settings
    #[serde(default)]
    pub install: InstallConfig,
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Timeout for API requests in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout for a single artifact download in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Overall deadline for resolve + fetch, if any
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            operation_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}
fn default_download_timeout() -> u64 {
    300 // 5 minutes
}
fn default_user_agent() -> String {
    "bt-self-update".to_string()
}

/// Retry policy configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Default retry policy
    #[serde(default)]
    pub default: RetryPolicy,

    /// Per-operation retry policies
    #[serde(default)]
    pub operations: HashMap<String, RetryPolicy>,
}

impl RetryPoliciesConfig {
    /// Policy for a named operation, falling back to the default policy
    pub fn policy_for(&self, operation: &str) -> RetryPolicy {
        self.operations
            .get(operation)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for RetryPoliciesConfig {
    fn default() -> Self {
        let mut operations = HashMap::new();

        operations.insert("download".to_string(), RetryPolicy::default());
        operations.insert(
            "resolve".to_string(),
            RetryPolicy {
                max_delay_ms: 4000,
                ..RetryPolicy::default()
            },
        );

        Self {
            default: RetryPolicy::default(),
            operations,
        }
    }
}

/// Retry policy for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    8000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// No delay between attempts
    None,

    /// Fixed delay between retries
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,
}

/// Release hosting configuration (GitHub Releases)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostingConfig {
    /// Base URL for the REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL for release asset downloads
    #[serde(default = "default_download_url")]
    pub download_url: String,

    /// Repository owner
    #[serde(default = "default_repo_owner")]
    pub repo_owner: String,

    /// Repository name
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// Environment variable holding an API token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            download_url: default_download_url(),
            repo_owner: default_repo_owner(),
            repo_name: default_repo_name(),
            token_env: default_token_env(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_download_url() -> String {
    "https://github.com".to_string()
}
fn default_repo_owner() -> String {
    "braintrustdata".to_string()
}
fn default_repo_name() -> String {
    "bt".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

/// Self-install configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstallConfig {
    /// Executable name inside release archives (without `.exe`)
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Run `<staged> --version` before activating it
    #[serde(default = "default_verify_binary")]
    pub verify_binary: bool,

    /// Keep the previous binary next to the new one after a successful update
    #[serde(default)]
    pub keep_backup: bool,

    /// Advisory lock file created in the install directory
    #[serde(default = "default_lock_file")]
    pub lock_file: String,

    /// Branch whose canary builds use the bare `canary` alias
    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// Number of hex characters in canary commit identifiers
    #[serde(default = "default_short_sha_len")]
    pub short_sha_len: usize,

    /// Digest algorithm used by the `.sha256` sibling objects
    #[serde(default)]
    pub checksum_algorithm: ChecksumAlgorithm,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            binary_name: default_binary_name(),
            verify_binary: default_verify_binary(),
            keep_backup: false,
            lock_file: default_lock_file(),
            main_branch: default_main_branch(),
            short_sha_len: default_short_sha_len(),
            checksum_algorithm: ChecksumAlgorithm::default(),
        }
    }
}

fn default_binary_name() -> String {
    "bt".to_string()
}
fn default_verify_binary() -> bool {
    true
}
fn default_lock_file() -> String {
    ".bt-update.lock".to_string()
}
fn default_main_branch() -> String {
    "main".to_string()
}
fn default_short_sha_len() -> usize {
    7
}

/// Supported artifact digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
}

impl ChecksumAlgorithm {
    /// Suffix of the sibling digest object
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }

    /// Length of the hex-encoded digest
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sha256 => 64,
        }
    }
}
