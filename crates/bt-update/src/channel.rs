//! Release channels and release identifiers
//!
//! Stable releases are tagged with semver (`v0.2.0`). Canary builds get an
//! immutable tag per commit (`canary-<sha>` for the main branch,
//! `canary-<slug>-<sha>` for other branches) plus a moving alias (`canary`,
//! `canary-<slug>`) that CI re-points at the newest build. Aliases are only
//! ever dereferenced, never installed as an identifier.

use bt_core::types::InstallConfig;
use regex::Regex;
use semver::Version;
use std::fmt;
use std::sync::LazyLock;

use crate::error::ChannelError;

/// Maximum length of a branch slug
pub const MAX_SLUG_LEN: usize = 40;

/// Minimum number of hex characters accepted for a commit
pub const MIN_SHORT_SHA_LEN: usize = 7;

const CANARY_PREFIX: &str = "canary";

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug regex is valid"));

/// Derive the tag-safe slug for a branch name
///
/// Lowercases, collapses every run of other characters into one `-`, trims
/// dashes from both ends and truncates to 40 characters. Different branches
/// may share a slug.
///
/// ```
/// use bt_update::branch_slug;
///
/// assert_eq!(branch_slug("Feature/Faster_Uploads"), "feature-faster-uploads");
/// assert_eq!(branch_slug("--main--"), "main");
/// ```
pub fn branch_slug(branch: &str) -> String {
    let lowered = branch.to_lowercase();
    let collapsed = NON_ALPHANUMERIC.replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');

    let truncated: String = trimmed.chars().take(MAX_SLUG_LEN).collect();
    truncated.trim_end_matches('-').to_string()
}

/// The channel named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelName {
    #[default]
    Stable,
    Canary,
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelName::Stable => f.write_str("stable"),
            ChannelName::Canary => f.write_str("canary"),
        }
    }
}

/// A release channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// Highest non-prerelease semver release
    Stable,

    /// Newest canary build of the main branch
    CanaryDefault,

    /// Newest canary build of a branch
    CanaryBranch { slug: String },

    /// One specific canary build. `slug` is `None` for the main branch.
    CanaryExact {
        short_sha: String,
        slug: Option<String>,
    },
}

impl Channel {
    /// Build a channel from raw command-line input
    ///
    /// The branch is slugged; a branch that slugs to the main branch selects
    /// the default canary. A commit is shortened to the configured length.
    pub fn from_request(
        name: ChannelName,
        branch: Option<&str>,
        commit: Option<&str>,
        scheme: &TagScheme,
    ) -> Result<Self, ChannelError> {
        if name == ChannelName::Stable {
            if branch.is_some() || commit.is_some() {
                return Err(ChannelError::StableWithCanaryOptions);
            }
            return Ok(Channel::Stable);
        }

        let slug = match branch {
            Some(raw) => {
                let slug = branch_slug(raw);
                if slug.is_empty() {
                    return Err(ChannelError::InvalidBranch(raw.to_string()));
                }
                if slug == scheme.main_branch {
                    None
                } else {
                    Some(slug)
                }
            }
            None => None,
        };

        match (commit, slug) {
            (Some(sha), slug) => Ok(Channel::CanaryExact {
                short_sha: scheme.short_sha(sha)?,
                slug,
            }),
            (None, Some(slug)) => Ok(Channel::CanaryBranch { slug }),
            (None, None) => Ok(Channel::CanaryDefault),
        }
    }

    pub fn name(&self) -> ChannelName {
        match self {
            Channel::Stable => ChannelName::Stable,
            _ => ChannelName::Canary,
        }
    }

    /// Command-line arguments that select this channel again
    pub fn cli_args(&self) -> String {
        match self {
            Channel::Stable => String::new(),
            Channel::CanaryDefault => "--channel canary".to_string(),
            Channel::CanaryBranch { slug } => format!("--channel canary --branch {}", slug),
            Channel::CanaryExact { short_sha, slug } => match slug {
                Some(slug) => format!("--channel canary --branch {} --commit {}", slug, short_sha),
                None => format!("--channel canary --commit {}", short_sha),
            },
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stable => write!(f, "stable"),
            Channel::CanaryDefault => write!(f, "canary"),
            Channel::CanaryBranch { slug } => write!(f, "canary ({})", slug),
            Channel::CanaryExact { short_sha, slug } => match slug {
                Some(slug) => write!(f, "canary ({} @ {})", slug, short_sha),
                None => write!(f, "canary (@ {})", short_sha),
            },
        }
    }
}

/// How canary tags are spelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagScheme {
    pub main_branch: String,
    pub short_sha_len: usize,
}

impl Default for TagScheme {
    fn default() -> Self {
        Self::from_config(&InstallConfig::default())
    }
}

impl TagScheme {
    pub fn from_config(config: &InstallConfig) -> Self {
        Self {
            main_branch: branch_slug(&config.main_branch),
            short_sha_len: config.short_sha_len.max(MIN_SHORT_SHA_LEN),
        }
    }

    /// Validate a commit and cut it to the configured length
    pub fn short_sha(&self, sha: &str) -> Result<String, ChannelError> {
        let sha = sha.trim().to_lowercase();
        if sha.len() < MIN_SHORT_SHA_LEN || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChannelError::InvalidCommit(sha));
        }
        Ok(sha.chars().take(self.short_sha_len).collect())
    }

    /// Moving alias for a canary channel; stable and exact channels have none
    pub fn alias(&self, channel: &Channel) -> Option<String> {
        match channel {
            Channel::CanaryDefault => Some(CANARY_PREFIX.to_string()),
            Channel::CanaryBranch { slug } => Some(format!("{}-{}", CANARY_PREFIX, slug)),
            Channel::Stable | Channel::CanaryExact { .. } => None,
        }
    }

    /// Immutable tag of a canary build
    pub fn canary_tag(
        &self,
        slug: Option<&str>,
        sha: &str,
    ) -> Result<ReleaseIdentifier, ChannelError> {
        let short = self.short_sha(sha)?;
        let tag = match slug {
            Some(slug) => format!("{}-{}-{}", CANARY_PREFIX, slug, short),
            None => format!("{}-{}", CANARY_PREFIX, short),
        };
        Ok(ReleaseIdentifier {
            tag,
            kind: ReleaseKind::Canary,
        })
    }
}

/// Whether a release came from the stable or canary line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseKind {
    Stable,
    Canary,
}

/// An immutable release tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseIdentifier {
    tag: String,
    kind: ReleaseKind,
}

impl ReleaseIdentifier {
    /// Identifier for a stable semver tag (`v` prefix optional)
    pub fn stable(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        parse_stable(&tag)?;
        Some(Self {
            tag,
            kind: ReleaseKind::Stable,
        })
    }

    /// Classify a tag of unknown origin, such as the compiled-in build tag
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        let kind = if tag.starts_with(CANARY_PREFIX) {
            ReleaseKind::Canary
        } else {
            ReleaseKind::Stable
        };
        Self {
            tag: tag.to_string(),
            kind,
        }
    }

    pub fn kind(&self) -> ReleaseKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// Parsed version of a stable tag
    pub fn semver(&self) -> Option<Version> {
        match self.kind {
            ReleaseKind::Stable => parse_stable(&self.tag),
            ReleaseKind::Canary => None,
        }
    }

    /// Tag without a leading `v`
    pub fn display_version(&self) -> &str {
        match self.kind {
            ReleaseKind::Stable => self.tag.strip_prefix('v').unwrap_or(&self.tag),
            ReleaseKind::Canary => &self.tag,
        }
    }

    /// Whether two identifiers name the same build
    ///
    /// Stable tags compare by version so that `v0.2.0` and `0.2.0` match.
    pub fn same_release(&self, other: &ReleaseIdentifier) -> bool {
        match (self.semver(), other.semver()) {
            (Some(a), Some(b)) => a == b,
            _ => self.tag == other.tag,
        }
    }
}

impl fmt::Display for ReleaseIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

fn parse_stable(tag: &str) -> Option<Version> {
    Version::parse(tag.strip_prefix('v').unwrap_or(tag)).ok()
}
