//! Test constants for bt-update tests

#![allow(dead_code)]

/// Tag of the installation under test
pub const CURRENT_TAG: &str = "v0.1.0";

/// Newest stable release published by the fake source
pub const LATEST_TAG: &str = "v0.2.0";

/// Commit the `canary` alias points at
pub const MAIN_COMMIT: &str = "abc1234def5678901234567890abcdef12345678";

/// Immutable tag of the main-branch canary build
pub const MAIN_CANARY_TAG: &str = "canary-abc1234";

/// Commit the `canary-feature-x` alias points at
pub const BRANCH_COMMIT: &str = "fedcba9876543210fedcba9876543210fedcba98";

/// Immutable tag of the feature branch canary build
pub const BRANCH_CANARY_TAG: &str = "canary-feature-x-fedcba9";

/// Platform all orchestrator tests pretend to run on
pub const TEST_OS: &str = "linux";
pub const TEST_ARCH: &str = "x86_64";

/// Artifact names for the test platform
pub const ARCHIVE_NAME: &str = "bt-x86_64-unknown-linux-gnu.tar.gz";
pub const CHECKSUM_NAME: &str = "bt-x86_64-unknown-linux-gnu.tar.gz.sha256";

/// Contents of the executable before an update
pub const OLD_BINARY: &str = "#!/bin/sh\necho 'bt 0.1.0'\n";

/// Contents of the executable shipped in test archives
pub const NEW_BINARY: &str = "#!/bin/sh\necho 'bt 0.2.0'\n";
