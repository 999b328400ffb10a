//! Advisory update lock
//!
//! One lock file per install directory keeps two `bt self update` runs from
//! staging into the same place. The lock is never waited on.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConcurrencyError, InstallError};

/// Exclusive lock held for the duration of an install
#[derive(Debug)]
pub struct UpdateLock {
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Take the lock or fail immediately with `AlreadyUpdating`
    pub fn acquire(dir: &Path, file_name: &str) -> Result<Self, InstallError> {
        let path = dir.join(file_name);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| InstallError::io(&path, e))?;

        let acquired = file
            .try_lock_exclusive()
            .map_err(|e| InstallError::io(&path, e))?;
        if !acquired {
            return Err(ConcurrencyError::AlreadyUpdating { lock_path: path }.into());
        }

        debug!("Acquired update lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to release update lock {}: {}", self.path.display(), e);
        }
    }
}
