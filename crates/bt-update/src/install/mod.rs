//! Installation management
//!
//! Works out who owns the running executable, then stages and activates a
//! verified release next to it under an advisory lock.

mod activation;
mod lock;
mod manager;
mod provenance;

pub use activation::{platform_default, Activation, ActivationStrategy, RenameActivation, SwapActivation};
pub use lock::UpdateLock;
pub use manager::{sweep_stale, InstallResult, InstallationManager, STAGING_PREFIX};
pub use provenance::{
    cargo_home_bin_path, detect_provenance, receipt_path, InstallationState, PackageManager,
    Provenance,
};
