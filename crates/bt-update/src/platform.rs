//! Platform detection and artifact naming
//!
//! Release archives are named `bt-<target-triple>.tar.gz` (`.zip` on
//! Windows) with a sibling `<archive>.sha256`.

use bt_core::types::{ChecksumAlgorithm, InstallConfig};
use std::fmt;

use crate::channel::ReleaseIdentifier;
use crate::error::LocatorError;

/// Operating system and architecture of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    pub os: String,
    pub arch: String,
}

impl PlatformTarget {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Target triple used in artifact names
    pub fn triple(&self) -> Result<&'static str, LocatorError> {
        let triple = match (self.os.as_str(), self.arch.as_str()) {
            ("linux", "x86_64") => "x86_64-unknown-linux-gnu",
            ("linux", "aarch64") => "aarch64-unknown-linux-gnu",
            ("macos", "x86_64") => "x86_64-apple-darwin",
            ("macos", "aarch64") => "aarch64-apple-darwin",
            ("windows", "x86_64") => "x86_64-pc-windows-msvc",
            ("windows", "aarch64") => "aarch64-pc-windows-msvc",
            _ => {
                return Err(LocatorError::UnsupportedPlatform {
                    os: self.os.clone(),
                    arch: self.arch.clone(),
                })
            }
        };
        Ok(triple)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn archive_format(&self) -> ArchiveFormat {
        if self.is_windows() {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        }
    }

    /// File name of an executable on this platform
    pub fn executable_name(&self, binary_name: &str) -> String {
        if self.is_windows() {
            format!("{}.exe", binary_name)
        } else {
            binary_name.to_string()
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Release archive container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// Names of the objects to download for one release and platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub release: ReleaseIdentifier,
    pub target: String,
    pub archive_name: String,
    pub checksum_name: String,
    pub format: ArchiveFormat,
    /// Executable file name inside the archive
    pub binary_name: String,
}

/// Computes artifact names
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    binary_name: String,
    algorithm: ChecksumAlgorithm,
}

impl Default for ArtifactLocator {
    fn default() -> Self {
        Self::new(&InstallConfig::default())
    }
}

impl ArtifactLocator {
    pub fn new(config: &InstallConfig) -> Self {
        Self {
            binary_name: config.binary_name.clone(),
            algorithm: config.checksum_algorithm,
        }
    }

    /// Artifact names for a release on a platform
    pub fn locate(
        &self,
        release: &ReleaseIdentifier,
        platform: &PlatformTarget,
    ) -> Result<ArtifactDescriptor, LocatorError> {
        let target = platform.triple()?;
        let format = platform.archive_format();
        let archive_name = format!("{}-{}.{}", self.binary_name, target, format.extension());
        let checksum_name = format!("{}.{}", archive_name, self.algorithm.extension());

        Ok(ArtifactDescriptor {
            release: release.clone(),
            target: target.to_string(),
            archive_name,
            checksum_name,
            format,
            binary_name: platform.executable_name(&self.binary_name),
        })
    }
}
