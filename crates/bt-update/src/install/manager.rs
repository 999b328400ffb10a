//! Staged installation with rollback
//!
//! The archive is extracted into a staging directory inside the install
//! directory so that activation is a same-volume rename. Until activation
//! succeeds the original executable is never modified; a crash at any point
//! before that leaves only a staging directory behind, which the next run
//! sweeps away.

use bt_core::types::InstallConfig;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::activation::{platform_default, ActivationStrategy};
use super::lock::UpdateLock;
use super::provenance::{InstallationState, Provenance};
use crate::archive;
use crate::channel::ReleaseIdentifier;
use crate::download::VerifiedArtifact;
use crate::error::InstallError;

/// Name prefix of staging directories
pub const STAGING_PREFIX: &str = ".bt-staging-";

/// Suffix of the previous binary kept during activation
const BACKUP_SUFFIX: &str = ".old";

/// Result of an installation
#[derive(Debug, Clone)]
pub struct InstallResult {
    /// Release that was running before the update
    pub previous: ReleaseIdentifier,

    /// Release now installed
    pub installed: ReleaseIdentifier,

    /// Path of the replaced executable
    pub executable: PathBuf,

    /// Previous binary, when kept or when it could not be removed yet
    pub backup: Option<PathBuf>,

    /// The old binary is still in use or the new one is not on PATH
    pub restart_required: bool,

    /// The install directory is on PATH
    pub path_visible: bool,

    /// The backup is held by the running process and is removed on next launch
    pub backup_pending_removal: bool,
}

/// Installs verified artifacts over the running executable
#[derive(Debug, Clone)]
pub struct InstallationManager {
    config: InstallConfig,
    strategy: Arc<dyn ActivationStrategy>,
    path_override: Option<OsString>,
}

impl InstallationManager {
    pub fn new(config: InstallConfig) -> Self {
        Self {
            config,
            strategy: platform_default(),
            path_override: None,
        }
    }

    /// Use a specific activation strategy instead of the platform default
    pub fn with_strategy(mut self, strategy: Arc<dyn ActivationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Check PATH visibility against this value instead of `$PATH`
    pub fn with_path_env(mut self, path: impl Into<OsString>) -> Self {
        self.path_override = Some(path.into());
        self
    }

    pub fn strategy(&self) -> &dyn ActivationStrategy {
        self.strategy.as_ref()
    }

    /// Replace the running executable with a verified artifact
    ///
    /// Package-managed installs are refused before anything is written.
    pub fn install(
        &self,
        artifact: &VerifiedArtifact,
        state: &InstallationState,
    ) -> Result<InstallResult, InstallError> {
        self.ensure_replaceable(state)?;
        if *state.provenance() == Provenance::Unknown {
            warn!(
                "Could not tell how {} was installed; replacing it in place",
                state.executable().display()
            );
        }

        let target = state.executable();
        let install_dir = state.install_dir()?;
        let _lock = UpdateLock::acquire(install_dir, &self.config.lock_file)?;

        sweep_stale(install_dir, target, !self.config.keep_backup);

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(install_dir)
            .map_err(|e| InstallError::io(install_dir, e))?;
        debug!("Staging in {}", staging.path().display());

        let staged = archive::extract_binary(
            artifact.bytes(),
            artifact.format(),
            &artifact.descriptor().binary_name,
            staging.path(),
        )?;
        make_executable(&staged)?;

        if self.config.verify_binary {
            verify_binary(&staged, &self.config.binary_name)?;
        }

        let backup = backup_path(target);
        let activation = self.strategy.activate(&staged, target, &backup)?;
        info!(
            "Activated {} at {} ({} strategy)",
            artifact.release(),
            target.display(),
            self.strategy.name()
        );

        if let Err(reason) = confirm_installed(target) {
            error!("New binary is not usable: {}", reason);
            return Err(restore_backup(&backup, target, reason));
        }

        let (backup, backup_pending_removal) = if self.config.keep_backup {
            (Some(backup), false)
        } else {
            match fs::remove_file(&backup) {
                Ok(()) => (None, false),
                Err(e) => {
                    warn!(
                        "Could not remove {} ({}); it will be removed on the next launch",
                        backup.display(),
                        e
                    );
                    (Some(backup), true)
                }
            }
        };

        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directory: {}", e);
        }

        let path_visible = self.is_on_path(install_dir);
        if !path_visible {
            warn!("{} is not on PATH", install_dir.display());
        }

        Ok(InstallResult {
            previous: state.current().clone(),
            installed: artifact.release().clone(),
            executable: target.to_path_buf(),
            backup,
            restart_required: activation.restart_required || !path_visible,
            path_visible,
            backup_pending_removal,
        })
    }

    /// Refuse executables owned by a package manager
    pub fn ensure_replaceable(&self, state: &InstallationState) -> Result<(), InstallError> {
        match state.provenance() {
            Provenance::PackageManaged { manager } => Err(InstallError::RefusedManagedInstall {
                manager: manager.to_string(),
                hint: manager.upgrade_hint().to_string(),
            }),
            Provenance::SelfManaged | Provenance::Unknown => Ok(()),
        }
    }

    /// Remove leftovers of earlier runs next to the executable
    ///
    /// Meant for startup: does nothing unless there is something to remove,
    /// never touches package-managed installs, and skips the sweep while
    /// another update holds the lock. A backup only counts as a leftover
    /// when `install.keep-backup` is off, which is also the only case where
    /// an update can leave one pending removal.
    pub fn cleanup_previous(&self, state: &InstallationState) -> usize {
        if matches!(state.provenance(), Provenance::PackageManaged { .. }) {
            return 0;
        }
        let Ok(install_dir) = state.install_dir() else {
            return 0;
        };
        let remove_backup = !self.config.keep_backup;
        if !has_leftovers(install_dir, state.executable(), remove_backup) {
            return 0;
        }

        match UpdateLock::acquire(install_dir, &self.config.lock_file) {
            Ok(_lock) => sweep_stale(install_dir, state.executable(), remove_backup),
            Err(e) => {
                debug!("Skipping cleanup: {}", e);
                0
            }
        }
    }

    fn is_on_path(&self, dir: &Path) -> bool {
        let path = match &self.path_override {
            Some(path) => Some(path.clone()),
            None => env::var_os("PATH"),
        };
        let Some(path) = path else {
            return false;
        };

        let wanted = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        env::split_paths(&path).any(|entry| {
            let entry = entry.canonicalize().unwrap_or(entry);
            entry == wanted
        })
    }
}

/// Remove stale staging directories next to `target`, and its backup when
/// `remove_backup` is set
///
/// Only `.bt-staging-*` directories and the exact backup name (`bt.old`,
/// `bt.exe.old`) are candidates; other files in a shared install directory
/// are never touched. Returns the number of entries removed. Failures are
/// logged, not returned.
pub fn sweep_stale(install_dir: &Path, target: &Path, remove_backup: bool) -> usize {
    let Ok(entries) = fs::read_dir(install_dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let result = if is_staging_dir(&path) {
            fs::remove_dir_all(&path)
        } else if remove_backup && is_backup_of(&path, target) {
            fs::remove_file(&path)
        } else {
            continue;
        };

        match result {
            Ok(()) => {
                debug!("Removed stale {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove stale {}: {}", path.display(), e),
        }
    }
    removed
}

fn has_leftovers(install_dir: &Path, target: &Path, remove_backup: bool) -> bool {
    fs::read_dir(install_dir)
        .map(|entries| {
            entries.filter_map(Result::ok).any(|e| {
                let path = e.path();
                is_staging_dir(&path) || (remove_backup && is_backup_of(&path, target))
            })
        })
        .unwrap_or(false)
}

fn is_staging_dir(path: &Path) -> bool {
    path.is_dir() && file_name(path).is_some_and(|n| n.starts_with(STAGING_PREFIX))
}

fn is_backup_of(path: &Path, target: &Path) -> bool {
    path.is_file() && path.file_name() == backup_path(target).file_name()
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// `bt` -> `bt.old`, `bt.exe` -> `bt.exe.old`
fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    target.with_file_name(name)
}

fn make_executable(path: &Path) -> Result<(), InstallError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| InstallError::io(path, e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Run `<binary> --version` and check that it identifies as bt
pub fn verify_binary(path: &Path, binary_name: &str) -> Result<(), InstallError> {
    debug!("Verifying binary at {}", path.display());

    let output = Command::new(path)
        .arg("--version")
        .output()
        .map_err(|e| InstallError::VerificationFailed(format!("could not execute: {}", e)))?;

    if !output.status.success() {
        return Err(InstallError::VerificationFailed(format!(
            "exit code {}",
            output.status.code().unwrap_or(-1)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.to_lowercase().contains(&binary_name.to_lowercase()) {
        return Err(InstallError::VerificationFailed(format!(
            "unexpected output: {}",
            stdout.trim()
        )));
    }

    debug!("Binary verification output: {}", stdout.trim());
    Ok(())
}

fn confirm_installed(target: &Path) -> Result<(), String> {
    let metadata = fs::metadata(target).map_err(|e| e.to_string())?;
    if !metadata.is_file() {
        return Err(format!("{} is not a file", target.display()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(format!("{} is not executable", target.display()));
        }
    }
    Ok(())
}

fn restore_backup(backup: &Path, target: &Path, reason: String) -> InstallError {
    match fs::rename(backup, target) {
        Ok(()) => {
            warn!("Restored previous binary from {}", backup.display());
            InstallError::PartialReplaceRecovered { reason }
        }
        Err(e) => InstallError::io(target, e),
    }
}
