//! Error types for the self-update engine
//!
//! Each component has its own error enum. The orchestrator wraps them in
//! `UpdateError`, which also records the stage that failed and maps onto the
//! CLI exit codes.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures reported by a release host
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{message}")]
    Network { message: String, transient: bool },

    #[error("release host rate limit exceeded; set {token_env} to authenticate and raise the limit")]
    RateLimited { token_env: String },
}

impl HostError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// A failure that may succeed on another attempt (timeouts, 5xx)
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            transient: true,
        }
    }

    /// A failure that will not change on retry (4xx, malformed responses)
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            transient: false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { transient: true, .. })
    }
}

/// Invalid channel selection from the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("invalid commit '{0}': expected at least 7 hexadecimal characters")]
    InvalidCommit(String),

    #[error("branch name '{0}' does not contain any letters or digits")]
    InvalidBranch(String),

    #[error("--branch and --commit are only valid with --channel canary")]
    StableWithCanaryOptions,
}

/// Channel resolution failures
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("no release found for {0}")]
    NotFound(String),

    #[error("network error while resolving release: {0}")]
    Network(String),

    #[error("release host rate limit exceeded; set {token_env} to authenticate and raise the limit")]
    RateLimited { token_env: String },
}

impl From<HostError> for ResolutionError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::NotFound { what } => Self::NotFound(what),
            HostError::Network { message, .. } => Self::Network(message),
            HostError::RateLimited { token_env } => Self::RateLimited { token_env },
        }
    }
}

/// Artifact naming failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("self-update is not supported on {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },
}

/// Download and integrity failures
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network error while downloading {object}: {message}")]
    Network { object: String, message: String },

    #[error("{object} is not published for release {release}")]
    NotFound { object: String, release: String },

    #[error("checksum mismatch for {object}: expected {expected}, got {actual}")]
    Integrity {
        object: String,
        expected: String,
        actual: String,
    },

    #[error("release host rate limit exceeded; set {token_env} to authenticate and raise the limit")]
    RateLimited { token_env: String },

    #[error("malformed checksum file {object}: {reason}")]
    MalformedChecksum { object: String, reason: String },
}

impl FetchError {
    pub(crate) fn from_host(err: HostError, object: &str, release: &str) -> Self {
        match err {
            HostError::NotFound { .. } => Self::NotFound {
                object: object.to_string(),
                release: release.to_string(),
            },
            HostError::Network { message, .. } => Self::Network {
                object: object.to_string(),
                message,
            },
            HostError::RateLimited { token_env } => Self::RateLimited { token_env },
        }
    }

    /// Integrity failures are reported by the verifying stage
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. } | Self::MalformedChecksum { .. })
    }
}

/// Another process holds the update lock
#[derive(Debug, Clone, Error)]
pub enum ConcurrencyError {
    #[error("another bt update is already running (lock held on {})", lock_path.display())]
    AlreadyUpdating { lock_path: PathBuf },
}

/// Installation failures
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("bt was installed by {manager}; update it with `{hint}`")]
    RefusedManagedInstall { manager: String, hint: String },

    #[error("permission denied writing {}; re-run with sufficient privileges", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("not enough space on the filesystem holding {}", path.display())]
    FilesystemFull { path: PathBuf },

    #[error("replacing the binary failed and the previous version was restored: {reason}")]
    PartialReplaceRecovered { reason: String },

    #[error("archive does not contain {name}")]
    BinaryNotFound { name: String },

    #[error("downloaded binary failed verification: {0}")]
    VerificationFailed(String),

    #[error("failed to extract archive: {0}")]
    Archive(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),
}

impl InstallError {
    /// Classify an IO failure on `path`
    pub fn io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            io::ErrorKind::StorageFull => Self::FilesystemFull {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Stage of the update state machine where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Fetching,
    Verifying,
    Installing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolving => "resolving",
            Stage::Fetching => "fetching",
            Stage::Verifying => "verifying",
            Stage::Installing => "installing",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a failed update
#[derive(Debug, Error)]
pub enum UpdateErrorKind {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Install(InstallError),

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("failed to configure release host: {0}")]
    Setup(String),
}

impl From<InstallError> for UpdateErrorKind {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::Concurrency(err) => Self::Concurrency(err),
            other => Self::Install(other),
        }
    }
}

/// A failed update: where it failed and why
#[derive(Debug, Error)]
#[error("update failed while {stage}: {kind}")]
pub struct UpdateError {
    pub stage: Stage,
    #[source]
    pub kind: UpdateErrorKind,
}

impl UpdateError {
    pub fn new(stage: Stage, kind: impl Into<UpdateErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    /// Process exit code for this failure
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 2 | network, rate limit, timeout |
    /// | 3 | integrity |
    /// | 4 | refused package-managed install |
    /// | 5 | unsupported platform |
    /// | 6 | another update is running |
    /// | 7 | release or artifact not found |
    /// | 1 | anything else |
    pub fn exit_code(&self) -> i32 {
        match &self.kind {
            UpdateErrorKind::Resolution(err) => match err {
                ResolutionError::NotFound(_) => 7,
                ResolutionError::Network(_) | ResolutionError::RateLimited { .. } => 2,
            },
            UpdateErrorKind::Locator(_) => 5,
            UpdateErrorKind::Fetch(err) => match err {
                FetchError::Network { .. } | FetchError::RateLimited { .. } => 2,
                FetchError::NotFound { .. } => 7,
                FetchError::Integrity { .. } | FetchError::MalformedChecksum { .. } => 3,
            },
            UpdateErrorKind::Install(InstallError::RefusedManagedInstall { .. }) => 4,
            UpdateErrorKind::Install(_) => 1,
            UpdateErrorKind::Concurrency(_) => 6,
            UpdateErrorKind::Timeout { .. } => 2,
            UpdateErrorKind::Setup(_) => 1,
        }
    }
}
