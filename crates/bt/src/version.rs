//! Version information for the bt CLI

use bt_update::ReleaseIdentifier;
use serde::{Deserialize, Serialize};

/// Release tag this binary was built as (`v0.2.0`, `canary-abc1234`)
pub const RELEASE_TAG: &str = env!("BT_RELEASE_TAG");

/// Version information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Package version
    pub version: String,

    /// Release tag the binary was published under
    pub release_tag: String,

    /// Git commit SHA (short)
    pub commit: Option<String>,

    /// Build date
    pub build_date: Option<String>,

    /// Target triple
    pub target: Option<String>,
}

impl VersionInfo {
    /// Create version info for current build
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            release_tag: RELEASE_TAG.to_string(),
            commit: option_env!("GIT_SHA").map(String::from),
            build_date: option_env!("BUILD_DATE").map(String::from),
            target: option_env!("TARGET").map(String::from),
        }
    }

    /// Identifier compared against channel resolutions
    pub fn release(&self) -> ReleaseIdentifier {
        ReleaseIdentifier::from_tag(&self.release_tag)
    }

    /// Format as display string
    pub fn display(&self) -> String {
        format!("bt {}", self.release().display_version())
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
