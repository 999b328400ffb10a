//! Install provenance detection
//!
//! bt only replaces itself when it was put in place by its own installer
//! (which leaves a receipt) or by `cargo install`. Copies owned by a package
//! manager are left for that manager to update.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::channel::ReleaseIdentifier;
use crate::error::InstallError;

/// Receipt written by the bt installer
pub const RECEIPT_FILE: &str = "bt-receipt.json";

/// Package managers that may own a bt executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Homebrew,
    Apt,
    Chocolatey,
    Scoop,
    Nix,
}

impl PackageManager {
    /// Command the user should run instead of `bt self update`
    pub fn upgrade_hint(&self) -> &'static str {
        match self {
            PackageManager::Homebrew => "brew upgrade bt",
            PackageManager::Apt => "sudo apt update && sudo apt install --only-upgrade bt",
            PackageManager::Chocolatey => "choco upgrade bt",
            PackageManager::Scoop => "scoop update bt",
            PackageManager::Nix => "nix profile upgrade bt",
        }
    }

    /// Detect a package manager from where the executable lives
    pub fn from_path(path: &Path) -> Option<Self> {
        let normalized = path.to_string_lossy().replace('\\', "/").to_lowercase();

        if normalized.contains("/cellar/")
            || normalized.contains("/homebrew/")
            || normalized.contains("/.linuxbrew/")
        {
            Some(PackageManager::Homebrew)
        } else if normalized.starts_with("/nix/store/") {
            Some(PackageManager::Nix)
        } else if normalized.starts_with("/usr/bin/") || normalized.starts_with("/usr/sbin/") {
            Some(PackageManager::Apt)
        } else if normalized.contains("/chocolatey/") {
            Some(PackageManager::Chocolatey)
        } else if normalized.contains("/scoop/apps/") || normalized.contains("/scoop/shims/") {
            Some(PackageManager::Scoop)
        } else {
            None
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageManager::Homebrew => "Homebrew",
            PackageManager::Apt => "apt",
            PackageManager::Chocolatey => "Chocolatey",
            PackageManager::Scoop => "Scoop",
            PackageManager::Nix => "Nix",
        };
        f.write_str(name)
    }
}

/// Who put the running executable in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// The bt installer or `cargo install`
    SelfManaged,

    /// A package manager that must perform upgrades itself
    PackageManaged { manager: PackageManager },

    /// A location bt cannot attribute; self-update proceeds with a warning
    Unknown,
}

/// Classify an executable path
///
/// Package-manager locations win over a receipt, since a receipt describes
/// the installer's copy rather than this one.
pub fn detect_provenance(
    exe: &Path,
    receipt_exists: bool,
    cargo_home_bin: Option<&Path>,
) -> Provenance {
    if let Some(manager) = PackageManager::from_path(exe) {
        return Provenance::PackageManaged { manager };
    }

    if receipt_exists {
        return Provenance::SelfManaged;
    }

    let in_cargo_home = cargo_home_bin
        .and_then(|bin| exe.parent().map(|parent| paths_equal(parent, bin)))
        .unwrap_or(false);
    if in_cargo_home {
        return Provenance::SelfManaged;
    }

    Provenance::Unknown
}

/// Location of the installer receipt
pub fn receipt_path() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .map(|path| path.join("bt").join(RECEIPT_FILE))
    }
    #[cfg(not(windows))]
    {
        if let Some(xdg) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(xdg).join("bt").join(RECEIPT_FILE));
        }
        env::var_os("HOME")
            .map(PathBuf::from)
            .map(|path| path.join(".config").join("bt").join(RECEIPT_FILE))
    }
}

/// `$CARGO_HOME/bin`, defaulting to `~/.cargo/bin`
pub fn cargo_home_bin_path() -> Option<PathBuf> {
    if let Some(cargo_home) = env::var_os("CARGO_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(cargo_home).join("bin"));
    }

    dirs_home().map(|home| home.join(".cargo").join("bin"))
}

fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        env::var_os("USERPROFILE").map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        env::var_os("HOME").map(PathBuf::from)
    }
}

fn paths_equal(a: &Path, b: &Path) -> bool {
    let left = a.canonicalize().unwrap_or_else(|_| a.to_path_buf());
    let right = b.canonicalize().unwrap_or_else(|_| b.to_path_buf());
    left == right
}

/// What is installed where, reconstructed on every invocation
#[derive(Debug, Clone)]
pub struct InstallationState {
    executable: PathBuf,
    current: ReleaseIdentifier,
    provenance: Provenance,
}

impl InstallationState {
    pub fn new(executable: PathBuf, current: ReleaseIdentifier, provenance: Provenance) -> Self {
        Self {
            executable,
            current,
            provenance,
        }
    }

    /// Inspect the running executable
    pub fn detect(current: ReleaseIdentifier) -> Result<Self, InstallError> {
        let exe = env::current_exe().map_err(|e| InstallError::io(Path::new("bt"), e))?;
        let exe = exe.canonicalize().unwrap_or(exe);

        let receipt_exists = receipt_path().is_some_and(|path| path.exists());
        let provenance = detect_provenance(&exe, receipt_exists, cargo_home_bin_path().as_deref());
        debug!(
            "Running {} ({}), provenance {:?}",
            exe.display(),
            current,
            provenance
        );

        Ok(Self::new(exe, current, provenance))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn current(&self) -> &ReleaseIdentifier {
        &self.current
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Directory holding the executable
    pub fn install_dir(&self) -> Result<&Path, InstallError> {
        self.executable
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| InstallError::Io {
                path: self.executable.clone(),
                source: std::io::Error::other("executable has no parent directory"),
            })
    }
}
