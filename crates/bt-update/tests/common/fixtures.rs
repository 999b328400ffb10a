//! Configuration and installation fixtures

#![allow(dead_code)]

use bt_core::retry::RecordingSleeper;
use bt_core::types::RuntimeConfig;
use bt_update::{
    InstallationManager, InstallationState, Orchestrator, PlatformTarget, Provenance,
    ReleaseIdentifier,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use super::archives::{checksum_file, release_archive};
use super::constants::*;
use super::fake_source::FakeSource;

/// Built-in defaults without running the staged binary
pub fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.install.verify_binary = false;
    config
}

/// A bt executable in a temporary install directory
pub struct FakeInstall {
    pub dir: TempDir,
    pub executable: PathBuf,
}

impl FakeInstall {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let executable = dir.path().join("bt");
        fs::write(&executable, OLD_BINARY).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();
        }
        Self { dir, executable }
    }

    pub fn state(&self, provenance: Provenance) -> InstallationState {
        InstallationState::new(
            self.executable.clone(),
            ReleaseIdentifier::from_tag(CURRENT_TAG),
            provenance,
        )
    }

    pub fn binary(&self) -> String {
        fs::read_to_string(&self.executable).unwrap()
    }

    /// File names in the install directory, sorted
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Installer that treats the install directory as being on PATH
    pub fn installer(&self) -> InstallationManager {
        InstallationManager::new(test_config().install).with_path_env(self.dir.path().as_os_str())
    }
}

/// Attach a release archive for the test platform and its checksum
pub fn with_artifact(source: FakeSource, tag: &str, binary: &str) -> FakeSource {
    let archive = release_archive(binary);
    let checksum = checksum_file(&archive, ARCHIVE_NAME);
    source
        .with_object(tag, ARCHIVE_NAME, archive)
        .with_object(tag, CHECKSUM_NAME, checksum)
}

/// Stable releases v0.1.0 through v0.2.0 with an artifact for the latest
pub fn stable_source() -> FakeSource {
    let source = FakeSource::new()
        .with_release("v0.1.0")
        .with_release("v0.1.5")
        .with_release(LATEST_TAG)
        .with_prerelease("v0.3.0-rc.1");
    with_artifact(source, LATEST_TAG, NEW_BINARY)
}

/// Orchestrator over a fake source, pinned to the test platform
pub fn orchestrator(
    source: &Arc<FakeSource>,
    install: &FakeInstall,
    provenance: Provenance,
) -> Orchestrator {
    let source: Arc<dyn bt_update::ReleaseSource> = source.clone();
    Orchestrator::new(source, &test_config(), install.state(provenance))
        .with_sleeper(Arc::new(RecordingSleeper::new()))
        .with_platform(PlatformTarget::new(TEST_OS, TEST_ARCH))
        .with_installer(install.installer())
}
