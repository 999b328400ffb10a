//! Putting a staged binary in place of the running one
//!
//! Unix can rename over a running executable, so activation is a single
//! atomic rename with a hard-linked backup. Windows refuses to overwrite a
//! running image but allows renaming it, so the old binary is moved aside
//! first and moved back if the second rename fails.

use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::InstallError;

/// Outcome of a successful activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// The running process still maps the old binary
    pub restart_required: bool,
}

/// Replaces `target` with `staged`, leaving the old binary at `backup`
pub trait ActivationStrategy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// On error the previous binary must still be at `target`
    fn activate(
        &self,
        staged: &Path,
        target: &Path,
        backup: &Path,
    ) -> Result<Activation, InstallError>;
}

/// The strategy for the platform bt was compiled for
pub fn platform_default() -> Arc<dyn ActivationStrategy> {
    #[cfg(windows)]
    {
        Arc::new(SwapActivation)
    }
    #[cfg(not(windows))]
    {
        Arc::new(RenameActivation)
    }
}

/// Atomic rename over the target
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameActivation;

impl ActivationStrategy for RenameActivation {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn activate(
        &self,
        staged: &Path,
        target: &Path,
        backup: &Path,
    ) -> Result<Activation, InstallError> {
        remove_if_exists(backup)?;

        if let Err(e) = fs::hard_link(target, backup) {
            debug!("Hard link to backup failed ({}), copying instead", e);
            fs::copy(target, backup).map_err(|e| InstallError::io(backup, e))?;
        }

        if let Err(e) = fs::rename(staged, target) {
            if let Err(cleanup) = fs::remove_file(backup) {
                warn!("Failed to remove backup {}: {}", backup.display(), cleanup);
            }
            return Err(InstallError::io(target, e));
        }

        debug!("Renamed {} over {}", staged.display(), target.display());
        Ok(Activation {
            restart_required: false,
        })
    }
}

/// Two renames with restore on failure
#[derive(Debug, Clone, Copy, Default)]
pub struct SwapActivation;

impl ActivationStrategy for SwapActivation {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn activate(
        &self,
        staged: &Path,
        target: &Path,
        backup: &Path,
    ) -> Result<Activation, InstallError> {
        remove_if_exists(backup)?;

        fs::rename(target, backup).map_err(|e| InstallError::io(target, e))?;

        if let Err(e) = fs::rename(staged, target) {
            warn!(
                "Moving new binary into place failed ({}), restoring {}",
                e,
                target.display()
            );
            return match fs::rename(backup, target) {
                Ok(()) => Err(InstallError::PartialReplaceRecovered {
                    reason: e.to_string(),
                }),
                Err(restore) => Err(InstallError::Io {
                    path: target.to_path_buf(),
                    source: std::io::Error::new(
                        restore.kind(),
                        format!(
                            "replacement failed ({}) and the previous binary could not be restored from {} ({})",
                            e,
                            backup.display(),
                            restore
                        ),
                    ),
                }),
            };
        }

        debug!("Swapped {} into {}", staged.display(), target.display());
        Ok(Activation {
            restart_required: true,
        })
    }
}

fn remove_if_exists(path: &Path) -> Result<(), InstallError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallError::io(path, e)),
    }
}
