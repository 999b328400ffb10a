//! Update orchestration
//!
//! Drives one `bt self update` invocation through the state machine
//!
//! ```text
//! Idle -> Resolving -> UpToDate
//!                   -> Fetching -> Verifying -> Installing -> Done
//! any stage -> Failed(stage, reason)
//! ```
//!
//! Resolution is read-only, so `--check` simply stops after it. An optional
//! deadline bounds the network stages; installation always runs to the end
//! on a blocking thread once it has started.

use bt_core::retry::Sleeper;
use bt_core::types::RuntimeConfig;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelName, ReleaseIdentifier, TagScheme};
use crate::download::{Fetcher, VerifiedArtifact};
use crate::error::{InstallError, Stage, UpdateError, UpdateErrorKind};
use crate::install::{InstallResult, InstallationManager, InstallationState};
use crate::platform::{ArtifactLocator, PlatformTarget};
use crate::releases::{GitHubReleases, ReleaseSource};
use crate::resolver::ChannelResolver;

/// What the user asked for
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub channel: Channel,

    /// Overrides `network.operation-timeout-secs`
    pub timeout: Option<Duration>,
}

impl UpdateRequest {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of the resolving stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub channel: Channel,
    pub current: ReleaseIdentifier,
    pub resolved: ReleaseIdentifier,
    pub up_to_date: bool,
}

impl UpdatePlan {
    /// Message printed by `bt self update --check`
    pub fn check_message(&self) -> String {
        match (self.channel.name(), self.up_to_date) {
            (ChannelName::Stable, true) => format!(
                "bt {} is up to date on the stable channel ({})",
                self.current.display_version(),
                self.resolved
            ),
            (ChannelName::Stable, false) => format!(
                "update available on stable channel: current={}, latest={}",
                self.current.display_version(),
                self.resolved
            ),
            (ChannelName::Canary, true) => format!(
                "bt is up to date on the {} channel ({})",
                self.channel, self.resolved
            ),
            (ChannelName::Canary, false) => format!(
                "latest canary release tag: {}\nrun `bt self update {}` to install it",
                self.resolved,
                self.channel.cli_args()
            ),
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub enum UpdateReport {
    UpToDate { plan: UpdatePlan },
    UpdateAvailable { plan: UpdatePlan },
    Updated { plan: UpdatePlan, result: InstallResult },
}

impl UpdateReport {
    pub fn plan(&self) -> &UpdatePlan {
        match self {
            UpdateReport::UpToDate { plan }
            | UpdateReport::UpdateAvailable { plan }
            | UpdateReport::Updated { plan, .. } => plan,
        }
    }
}

/// States of an update run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Resolving,
    UpToDate,
    Fetching,
    Verifying,
    Installing,
    Done,
    Failed { stage: Stage, reason: String },
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateState::Idle => f.write_str("idle"),
            UpdateState::Resolving => f.write_str("resolving"),
            UpdateState::UpToDate => f.write_str("up to date"),
            UpdateState::Fetching => f.write_str("fetching"),
            UpdateState::Verifying => f.write_str("verifying"),
            UpdateState::Installing => f.write_str("installing"),
            UpdateState::Done => f.write_str("done"),
            UpdateState::Failed { stage, reason } => {
                write!(f, "failed while {}: {}", stage, reason)
            }
        }
    }
}

/// Deadline for the network stages of one run
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    fn starting_now(limit: Option<Duration>) -> Option<Self> {
        limit.map(|limit| Self {
            at: Instant::now() + limit,
            limit,
        })
    }
}

/// Runs self-updates for one installation
pub struct Orchestrator {
    resolver: ChannelResolver,
    locator: ArtifactLocator,
    fetcher: Fetcher,
    installer: InstallationManager,
    platform: PlatformTarget,
    installation: InstallationState,
    default_timeout: Option<Duration>,
    history: Mutex<Vec<UpdateState>>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        config: &RuntimeConfig,
        installation: InstallationState,
    ) -> Self {
        let policies = &config.retry_policies;
        Self {
            resolver: ChannelResolver::new(
                Arc::clone(&source),
                TagScheme::from_config(&config.install),
                policies.policy_for("resolve"),
            ),
            locator: ArtifactLocator::new(&config.install),
            fetcher: Fetcher::new(
                source,
                policies.policy_for("download"),
                config.install.checksum_algorithm,
            ),
            installer: InstallationManager::new(config.install.clone()),
            platform: PlatformTarget::current(),
            installation,
            default_timeout: config.network.operation_timeout_secs.map(Duration::from_secs),
            history: Mutex::new(vec![UpdateState::Idle]),
        }
    }

    /// Orchestrator backed by the configured GitHub repository
    pub fn from_config(
        config: &RuntimeConfig,
        installation: InstallationState,
    ) -> Result<Self, UpdateError> {
        let source = GitHubReleases::new(&config.hosting, &config.network)
            .map_err(|e| UpdateError::new(Stage::Resolving, UpdateErrorKind::Setup(e.to_string())))?;
        Ok(Self::new(Arc::new(source), config, installation))
    }

    /// Replace the backoff sleeper used by resolution and downloads
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.resolver = self.resolver.with_sleeper(Arc::clone(&sleeper));
        self.fetcher = self.fetcher.with_sleeper(sleeper);
        self
    }

    pub fn with_platform(mut self, platform: PlatformTarget) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_installer(mut self, installer: InstallationManager) -> Self {
        self.installer = installer;
        self
    }

    pub fn installation(&self) -> &InstallationState {
        &self.installation
    }

    pub fn installer(&self) -> &InstallationManager {
        &self.installer
    }

    /// Every state this orchestrator has passed through, oldest first
    pub fn history(&self) -> Vec<UpdateState> {
        self.history_guard().clone()
    }

    pub fn state(&self) -> UpdateState {
        self.history_guard()
            .last()
            .cloned()
            .unwrap_or(UpdateState::Idle)
    }

    /// Resolve and, unless `check_only`, install the requested channel
    pub async fn run(
        &self,
        request: &UpdateRequest,
        check_only: bool,
    ) -> Result<UpdateReport, UpdateError> {
        let deadline = Deadline::starting_now(request.timeout.or(self.default_timeout));

        let plan = self.plan_within(&request.channel, deadline).await?;
        if plan.up_to_date {
            return Ok(self.up_to_date(plan));
        }
        if check_only {
            debug!("Check only, stopping after resolution");
            return Ok(UpdateReport::UpdateAvailable { plan });
        }

        self.apply_within(plan, deadline).await
    }

    /// Resolving stage only
    pub async fn plan(&self, request: &UpdateRequest) -> Result<UpdatePlan, UpdateError> {
        let deadline = Deadline::starting_now(request.timeout.or(self.default_timeout));
        self.plan_within(&request.channel, deadline).await
    }

    /// Fetch, verify and install a plan returned by [`Orchestrator::plan`]
    ///
    /// The timeout starts again here so that time spent at a confirmation
    /// prompt is not counted.
    pub async fn apply(
        &self,
        plan: UpdatePlan,
        request: &UpdateRequest,
    ) -> Result<UpdateReport, UpdateError> {
        if plan.up_to_date {
            return Ok(self.up_to_date(plan));
        }
        let deadline = Deadline::starting_now(request.timeout.or(self.default_timeout));
        self.apply_within(plan, deadline).await
    }

    async fn plan_within(
        &self,
        channel: &Channel,
        deadline: Option<Deadline>,
    ) -> Result<UpdatePlan, UpdateError> {
        self.transition(UpdateState::Resolving);

        let resolved = self
            .within(deadline, Stage::Resolving, async {
                self.resolver
                    .resolve(channel)
                    .await
                    .map_err(|e| UpdateError::new(Stage::Resolving, e))
            })
            .await
            .map_err(|e| self.fail(e))?;

        let current = self.installation.current().clone();
        let up_to_date = resolved.same_release(&current);
        debug!(
            "Current {}, resolved {}, up to date: {}",
            current, resolved, up_to_date
        );

        Ok(UpdatePlan {
            channel: channel.clone(),
            current,
            resolved,
            up_to_date,
        })
    }

    async fn apply_within(
        &self,
        plan: UpdatePlan,
        deadline: Option<Deadline>,
    ) -> Result<UpdateReport, UpdateError> {
        // Refuse before downloading anything
        self.installer
            .ensure_replaceable(&self.installation)
            .map_err(|e| self.fail(UpdateError::new(Stage::Installing, e)))?;

        let artifact = self
            .fetch_and_verify(&plan.resolved, deadline)
            .await
            .map_err(|e| self.fail(e))?;

        self.transition(UpdateState::Installing);
        let result = self
            .install(artifact)
            .await
            .map_err(|e| self.fail(e))?;

        self.transition(UpdateState::Done);
        info!("Updated {} -> {}", result.previous, result.installed);
        Ok(UpdateReport::Updated { plan, result })
    }

    async fn fetch_and_verify(
        &self,
        release: &ReleaseIdentifier,
        deadline: Option<Deadline>,
    ) -> Result<VerifiedArtifact, UpdateError> {
        self.transition(UpdateState::Fetching);

        let descriptor = self
            .locator
            .locate(release, &self.platform)
            .map_err(|e| UpdateError::new(Stage::Fetching, e))?;

        let (bytes, expected) = self
            .within(deadline, Stage::Fetching, async {
                self.fetcher.fetch_pair(&descriptor).await.map_err(|e| {
                    let stage = if e.is_integrity() {
                        Stage::Verifying
                    } else {
                        Stage::Fetching
                    };
                    UpdateError::new(stage, e)
                })
            })
            .await?;

        self.transition(UpdateState::Verifying);
        self.fetcher
            .verify(&descriptor, bytes, &expected)
            .map_err(|e| UpdateError::new(Stage::Verifying, e))
    }

    async fn install(&self, artifact: VerifiedArtifact) -> Result<InstallResult, UpdateError> {
        let installer = self.installer.clone();
        let installation = self.installation.clone();

        let joined =
            tokio::task::spawn_blocking(move || installer.install(&artifact, &installation)).await;

        match joined {
            Ok(result) => result.map_err(|e| UpdateError::new(Stage::Installing, e)),
            Err(e) => Err(UpdateError::new(
                Stage::Installing,
                InstallError::Io {
                    path: self.installation.executable().to_path_buf(),
                    source: std::io::Error::other(format!("install task failed: {}", e)),
                },
            )),
        }
    }

    async fn within<T, F>(
        &self,
        deadline: Option<Deadline>,
        stage: Stage,
        fut: F,
    ) -> Result<T, UpdateError>
    where
        F: Future<Output = Result<T, UpdateError>>,
    {
        let Some(deadline) = deadline else {
            return fut.await;
        };

        match tokio::time::timeout_at(deadline.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(UpdateError::new(
                stage,
                UpdateErrorKind::Timeout {
                    secs: deadline.limit.as_secs(),
                },
            )),
        }
    }

    fn up_to_date(&self, plan: UpdatePlan) -> UpdateReport {
        self.transition(UpdateState::UpToDate);
        UpdateReport::UpToDate { plan }
    }

    fn fail(&self, err: UpdateError) -> UpdateError {
        warn!("Self-update {}", err);
        self.transition(UpdateState::Failed {
            stage: err.stage,
            reason: err.kind.to_string(),
        });
        err
    }

    fn transition(&self, next: UpdateState) {
        let mut history = self.history_guard();
        if let Some(previous) = history.last() {
            info!("Update state {} -> {}", previous, next);
        }
        history.push(next);
    }

    fn history_guard(&self) -> MutexGuard<'_, Vec<UpdateState>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
