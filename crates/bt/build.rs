//! Build script for version info

fn main() {
    // Set build timestamp
    let now = chrono::Utc::now();
    println!("cargo:rustc-env=BUILD_DATE={}", now.format("%Y-%m-%d"));

    // Release CI sets BT_RELEASE_TAG for canary builds (canary-<slug>-<sha>);
    // everything else identifies as the stable tag for the package version
    let release_tag = std::env::var("BT_RELEASE_TAG")
        .ok()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .unwrap_or_else(|| format!("v{}", env!("CARGO_PKG_VERSION")));
    println!("cargo:rustc-env=BT_RELEASE_TAG={}", release_tag);
    println!("cargo:rerun-if-env-changed=BT_RELEASE_TAG");

    if let Ok(target) = std::env::var("TARGET") {
        println!("cargo:rustc-env=TARGET={}", target);
    }

    // Try to get git info
    if let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
    {
        if output.status.success() {
            let sha = String::from_utf8_lossy(&output.stdout);
            println!("cargo:rustc-env=GIT_SHA={}", sha.trim());
        }
    }

    // Rerun if git changes
    println!("cargo:rerun-if-changed=.git/HEAD");
}
