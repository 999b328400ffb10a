//! Self-update engine for the bt CLI
//!
//! Provides:
//! - Release channel resolution (stable, canary, per-branch and exact canaries)
//! - Platform artifact naming
//! - Artifact download with retry and SHA256 verification
//! - Install provenance detection
//! - Staged, locked, atomic binary replacement with rollback
//! - An orchestrator tying it together for `bt self update`

pub mod archive;
pub mod channel;
pub mod download;
pub mod error;
pub mod install;
pub mod platform;
pub mod releases;
pub mod resolver;
pub mod updater;

pub use channel::{branch_slug, Channel, ChannelName, ReleaseIdentifier, ReleaseKind, TagScheme};
pub use download::{Fetcher, VerifiedArtifact};
pub use error::{
    ChannelError, ConcurrencyError, FetchError, HostError, InstallError, LocatorError,
    ResolutionError, Stage, UpdateError, UpdateErrorKind,
};
pub use install::{
    ActivationStrategy, InstallResult, InstallationManager, InstallationState, PackageManager,
    Provenance, RenameActivation, SwapActivation,
};
pub use platform::{ArchiveFormat, ArtifactDescriptor, ArtifactLocator, PlatformTarget};
pub use releases::{GitHubReleases, Release, ReleaseSource};
pub use resolver::ChannelResolver;
pub use updater::{Orchestrator, UpdatePlan, UpdateReport, UpdateRequest, UpdateState};
