//! Channel resolution
//!
//! Maps a channel to the immutable release it currently stands for. This is
//! read-only: it lists releases and dereferences tags but never downloads an
//! artifact.

use bt_core::retry::{Sleeper, TokioSleeper};
use bt_core::types::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, info};

use crate::channel::{Channel, ReleaseIdentifier, TagScheme};
use crate::error::{HostError, ResolutionError};
use crate::releases::{with_retry, Release, ReleaseSource};

/// Resolves channels against a release source
pub struct ChannelResolver {
    source: Arc<dyn ReleaseSource>,
    scheme: TagScheme,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ChannelResolver {
    pub fn new(source: Arc<dyn ReleaseSource>, scheme: TagScheme, policy: RetryPolicy) -> Self {
        Self {
            source,
            scheme,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn scheme(&self) -> &TagScheme {
        &self.scheme
    }

    /// Resolve a channel to an immutable release identifier
    pub async fn resolve(&self, channel: &Channel) -> Result<ReleaseIdentifier, ResolutionError> {
        debug!("Resolving channel {}", channel);

        let resolved = match channel {
            Channel::Stable => self.resolve_stable().await?,
            Channel::CanaryDefault => self.resolve_alias(channel, None).await?,
            Channel::CanaryBranch { slug } => {
                self.resolve_alias(channel, Some(slug.as_str())).await?
            }
            Channel::CanaryExact { short_sha, slug } => {
                let tag = self
                    .scheme
                    .canary_tag(slug.as_deref(), short_sha)
                    .map_err(|e| ResolutionError::NotFound(e.to_string()))?;
                self.confirm_release(&tag).await?;
                tag
            }
        };

        info!("Channel {} resolved to {}", channel, resolved);
        Ok(resolved)
    }

    async fn resolve_stable(&self) -> Result<ReleaseIdentifier, ResolutionError> {
        let releases = with_retry("resolve", &self.policy, &self.sleeper, || {
            self.source.list_releases()
        })
        .await?;

        latest_stable(&releases)
            .ok_or_else(|| ResolutionError::NotFound("the stable channel".to_string()))
    }

    async fn resolve_alias(
        &self,
        channel: &Channel,
        slug: Option<&str>,
    ) -> Result<ReleaseIdentifier, ResolutionError> {
        let alias = self
            .scheme
            .alias(channel)
            .ok_or_else(|| ResolutionError::NotFound(channel.to_string()))?;

        let commit = with_retry("resolve", &self.policy, &self.sleeper, || {
            self.source.resolve_tag(&alias)
        })
        .await
        .map_err(|e| match e {
            HostError::NotFound { .. } => {
                ResolutionError::NotFound(format!("channel {} (no '{}' tag)", channel, alias))
            }
            other => other.into(),
        })?;
        debug!("Alias {} points to {}", alias, commit);

        let tag = self
            .scheme
            .canary_tag(slug, &commit)
            .map_err(|e| ResolutionError::NotFound(format!("alias {}: {}", alias, e)))?;
        self.confirm_release(&tag).await?;
        Ok(tag)
    }

    async fn confirm_release(&self, tag: &ReleaseIdentifier) -> Result<(), ResolutionError> {
        let release = with_retry("resolve", &self.policy, &self.sleeper, || {
            self.source.get_release(tag.as_str())
        })
        .await
        .map_err(|e| match e {
            HostError::NotFound { .. } => ResolutionError::NotFound(format!("release {}", tag)),
            other => other.into(),
        })?;

        if release.draft {
            return Err(ResolutionError::NotFound(format!("release {}", tag)));
        }
        Ok(())
    }
}

/// Highest published, non-prerelease semver release
///
/// Releases flagged as prereleases on the host are skipped even when their
/// tag has no pre-release component.
pub fn latest_stable(releases: &[Release]) -> Option<ReleaseIdentifier> {
    releases
        .iter()
        .filter(|r| !r.draft && !r.prerelease)
        .filter_map(|r| ReleaseIdentifier::stable(r.tag_name.as_str()))
        .filter(|id| id.semver().is_some_and(|v| v.pre.is_empty()))
        .max_by(|a, b| a.semver().cmp(&b.semver()))
}
