//! Installation manager tests
//!
//! Exercises staged installation in a temporary install directory:
//! - Provenance gating
//! - Rollback when activation fails
//! - Sweeping leftovers of interrupted runs
//! - Backup handling and PATH visibility

mod common;

use bt_core::types::{ChecksumAlgorithm, RetryPolicy};
use bt_update::install::{Activation, UpdateLock};
use bt_update::{
    ActivationStrategy, ArtifactLocator, Fetcher, InstallError, InstallationManager,
    PackageManager, PlatformTarget, Provenance, ReleaseIdentifier, RenameActivation,
    SwapActivation, VerifiedArtifact,
};
use bytes::Bytes;
use common::*;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

fn artifact(archive: Vec<u8>) -> VerifiedArtifact {
    let fetcher = Fetcher::new(
        Arc::new(FakeSource::new()),
        RetryPolicy::default(),
        ChecksumAlgorithm::Sha256,
    );
    let descriptor = ArtifactLocator::default()
        .locate(
            &ReleaseIdentifier::from_tag(LATEST_TAG),
            &PlatformTarget::new(TEST_OS, TEST_ARCH),
        )
        .unwrap();
    let digest = bt_update::download::sha256_hex(&archive);
    fetcher
        .verify(&descriptor, Bytes::from(archive), &digest)
        .unwrap()
}

/// Fails after staging, before the target is touched
#[derive(Debug)]
struct FailingActivation;

impl ActivationStrategy for FailingActivation {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn activate(
        &self,
        staged: &Path,
        _target: &Path,
        _backup: &Path,
    ) -> Result<Activation, InstallError> {
        assert!(staged.is_file(), "binary should be staged before activation");
        Err(InstallError::Io {
            path: staged.to_path_buf(),
            source: io::Error::other("simulated crash"),
        })
    }
}

/// Activates normally, then drops the exec bit from the new binary
#[derive(Debug)]
struct NonExecutableActivation;

impl ActivationStrategy for NonExecutableActivation {
    fn name(&self) -> &'static str {
        "non-executable"
    }

    fn activate(
        &self,
        staged: &Path,
        target: &Path,
        backup: &Path,
    ) -> Result<Activation, InstallError> {
        let activation = RenameActivation.activate(staged, target, backup)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(target, fs::Permissions::from_mode(0o644)).unwrap();
        }
        Ok(activation)
    }
}

/// Installer that runs `<staged> --version` before activating
fn verifying_installer(install: &FakeInstall) -> InstallationManager {
    let mut config = test_config().install;
    config.verify_binary = true;
    InstallationManager::new(config).with_path_env(install.dir.path().as_os_str())
}

#[test]
fn test_install_replaces_binary() {
    let install = FakeInstall::new();
    let manager = install.installer();

    let result = manager
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap();

    assert_eq!(install.binary(), NEW_BINARY);
    assert_eq!(result.previous.as_str(), CURRENT_TAG);
    assert_eq!(result.installed.as_str(), LATEST_TAG);
    assert_eq!(result.executable, install.executable);
    assert!(result.backup.is_none());
    assert!(result.path_visible);
    assert_eq!(install.entries(), vec![".bt-update.lock", "bt"]);
}

#[cfg(unix)]
#[test]
fn test_installed_binary_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let install = FakeInstall::new();
    let archive = tar_gz(&[("bt", NEW_BINARY)]);
    install
        .installer()
        .install(&artifact(archive), &install.state(Provenance::SelfManaged))
        .unwrap();

    let mode = fs::metadata(&install.executable).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn test_package_managed_install_is_refused_without_writing() {
    let install = FakeInstall::new();
    let state = install.state(Provenance::PackageManaged {
        manager: PackageManager::Homebrew,
    });

    let err = install
        .installer()
        .install(&artifact(release_archive(NEW_BINARY)), &state)
        .unwrap_err();

    match err {
        InstallError::RefusedManagedInstall { manager, hint } => {
            assert_eq!(manager, "Homebrew");
            assert_eq!(hint, "brew upgrade bt");
        }
        other => panic!("expected RefusedManagedInstall, got {:?}", other),
    }
    assert_eq!(install.binary(), OLD_BINARY);
    assert_eq!(install.entries(), vec!["bt"]);
}

#[test]
fn test_unknown_provenance_proceeds() {
    let install = FakeInstall::new();

    install
        .installer()
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::Unknown),
        )
        .unwrap();
    assert_eq!(install.binary(), NEW_BINARY);
}

#[test]
fn test_failure_between_staging_and_activation_keeps_original() {
    let install = FakeInstall::new();
    let manager = install
        .installer()
        .with_strategy(Arc::new(FailingActivation));

    let err = manager
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap_err();

    assert!(matches!(err, InstallError::Io { .. }));
    assert_eq!(install.binary(), OLD_BINARY);
    assert_eq!(install.entries(), vec![".bt-update.lock", "bt"]);
}

#[test]
fn test_leftovers_of_interrupted_run_are_swept() {
    let install = FakeInstall::new();
    let staging = install.dir.path().join(".bt-staging-Xy12Ab");
    fs::create_dir(&staging).unwrap();
    fs::write(staging.join("bt"), "half-extracted").unwrap();
    fs::write(install.dir.path().join("bt.old"), OLD_BINARY).unwrap();

    // The interrupted run never reached activation
    assert_eq!(install.binary(), OLD_BINARY);

    install
        .installer()
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap();

    assert_eq!(install.binary(), NEW_BINARY);
    assert_eq!(install.entries(), vec![".bt-update.lock", "bt"]);
}

#[test]
fn test_cleanup_previous_on_launch() {
    let install = FakeInstall::new();
    let manager = install.installer();
    let state = install.state(Provenance::SelfManaged);

    // Nothing to remove: no lock file is created either
    assert_eq!(manager.cleanup_previous(&state), 0);
    assert_eq!(install.entries(), vec!["bt"]);

    fs::write(install.dir.path().join("bt.old"), OLD_BINARY).unwrap();
    fs::create_dir(install.dir.path().join(".bt-staging-abc")).unwrap();
    assert_eq!(manager.cleanup_previous(&state), 2);
    assert!(!install.dir.path().join("bt.old").exists());
}

#[test]
fn test_cleanup_previous_skips_while_update_runs() {
    let install = FakeInstall::new();
    fs::write(install.dir.path().join("bt.old"), OLD_BINARY).unwrap();
    let _lock = UpdateLock::acquire(install.dir.path(), ".bt-update.lock").unwrap();

    let removed = install
        .installer()
        .cleanup_previous(&install.state(Provenance::SelfManaged));
    assert_eq!(removed, 0);
    assert!(install.dir.path().join("bt.old").exists());
}

#[test]
fn test_cleanup_leaves_other_tools_alone() {
    let install = FakeInstall::new();
    let state = install.state(Provenance::SelfManaged);
    fs::write(install.dir.path().join("btop.old"), "another tool").unwrap();
    fs::write(install.dir.path().join("bt-helper.old"), "another tool").unwrap();

    assert_eq!(install.installer().cleanup_previous(&state), 0);
    install
        .installer()
        .install(&artifact(release_archive(NEW_BINARY)), &state)
        .unwrap();

    assert_eq!(install.binary(), NEW_BINARY);
    assert_eq!(
        install.entries(),
        vec![".bt-update.lock", "bt", "bt-helper.old", "btop.old"]
    );
}

#[test]
fn test_kept_backup_survives_next_launch() {
    let install = FakeInstall::new();
    let mut config = test_config().install;
    config.keep_backup = true;
    let manager = InstallationManager::new(config).with_path_env(install.dir.path().as_os_str());
    let state = install.state(Provenance::SelfManaged);

    manager
        .install(&artifact(release_archive(NEW_BINARY)), &state)
        .unwrap();
    assert_eq!(manager.cleanup_previous(&state), 0);

    let backup = install.dir.path().join("bt.old");
    assert_eq!(fs::read_to_string(backup).unwrap(), OLD_BINARY);
}

#[cfg(unix)]
#[test]
fn test_failing_version_check_keeps_original() {
    let install = FakeInstall::new();
    let archive = tar_gz(&[("bt", "#!/bin/sh\nexit 3\n")]);

    let err = verifying_installer(&install)
        .install(&artifact(archive), &install.state(Provenance::SelfManaged))
        .unwrap_err();

    assert!(matches!(err, InstallError::VerificationFailed(_)));
    assert_eq!(install.binary(), OLD_BINARY);
    assert_eq!(install.entries(), vec![".bt-update.lock", "bt"]);
}

#[cfg(unix)]
#[test]
fn test_version_output_must_name_bt() {
    let install = FakeInstall::new();
    let archive = tar_gz(&[("bt", "#!/bin/sh\necho 'something else 1.0'\n")]);

    let err = verifying_installer(&install)
        .install(&artifact(archive), &install.state(Provenance::SelfManaged))
        .unwrap_err();

    assert!(matches!(err, InstallError::VerificationFailed(_)));
    assert_eq!(install.binary(), OLD_BINARY);
}

#[cfg(unix)]
#[test]
fn test_unusable_binary_after_activation_is_rolled_back() {
    use std::os::unix::fs::PermissionsExt;

    let install = FakeInstall::new();
    let manager = install
        .installer()
        .with_strategy(Arc::new(NonExecutableActivation));

    let err = manager
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap_err();

    assert!(matches!(err, InstallError::PartialReplaceRecovered { .. }));
    assert_eq!(install.binary(), OLD_BINARY);
    assert_eq!(install.entries(), vec![".bt-update.lock", "bt"]);
    let mode = fs::metadata(&install.executable).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
}

#[test]
fn test_concurrent_update_is_rejected() {
    let install = FakeInstall::new();
    let _lock = UpdateLock::acquire(install.dir.path(), ".bt-update.lock").unwrap();

    let err = install
        .installer()
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap_err();

    assert!(matches!(err, InstallError::Concurrency(_)));
    assert_eq!(install.binary(), OLD_BINARY);
}

#[test]
fn test_keep_backup() {
    let install = FakeInstall::new();
    let mut config = test_config().install;
    config.keep_backup = true;
    let manager = InstallationManager::new(config).with_path_env(install.dir.path().as_os_str());

    let result = manager
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap();

    let backup = install.dir.path().join("bt.old");
    assert_eq!(result.backup.as_deref(), Some(backup.as_path()));
    assert!(!result.backup_pending_removal);
    assert_eq!(fs::read_to_string(backup).unwrap(), OLD_BINARY);
}

#[test]
fn test_swap_activation_requires_restart() {
    let install = FakeInstall::new();
    let manager = install.installer().with_strategy(Arc::new(SwapActivation));

    let result = manager
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap();

    assert!(result.restart_required);
    assert_eq!(install.binary(), NEW_BINARY);
}

#[test]
fn test_install_dir_not_on_path() {
    let install = FakeInstall::new();
    let elsewhere = tempfile::TempDir::new().unwrap();
    let manager = InstallationManager::new(test_config().install)
        .with_path_env(elsewhere.path().as_os_str());

    let result = manager
        .install(
            &artifact(release_archive(NEW_BINARY)),
            &install.state(Provenance::SelfManaged),
        )
        .unwrap();

    assert!(!result.path_visible);
    assert!(result.restart_required);
}

#[test]
fn test_archive_without_binary_keeps_original() {
    let install = FakeInstall::new();
    let archive = tar_gz(&[("README.md", "no binary here")]);

    let err = install
        .installer()
        .install(&artifact(archive), &install.state(Provenance::SelfManaged))
        .unwrap_err();

    assert!(matches!(err, InstallError::BinaryNotFound { .. }));
    assert_eq!(install.binary(), OLD_BINARY);
    assert_eq!(install.entries(), vec![".bt-update.lock", "bt"]);
}
