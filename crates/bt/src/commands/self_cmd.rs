//! Self-management commands

use anyhow::{Context, Result};
use bt_core::{HierarchicalConfigLoader, RuntimeConfig};
use bt_update::{
    Channel, InstallResult, InstallationManager, InstallationState, Orchestrator, TagScheme,
    UpdatePlan, UpdateReport, UpdateRequest,
};
use dialoguer::Confirm;
use std::time::Duration;
use tracing::debug;

use crate::cli::{SelfCommands, UpdateArgs};
use crate::output;
use crate::version::VersionInfo;

pub async fn run(cmd: SelfCommands) -> Result<()> {
    match cmd {
        SelfCommands::Update(args) => update(args).await,
    }
}

fn load_config() -> Result<RuntimeConfig> {
    let config = HierarchicalConfigLoader::new()
        .and_then(|loader| loader.load_runtime_config())
        .context("Failed to load runtime configuration")?;
    Ok(config)
}

/// Build the update request from command-line flags
fn request_from_args(args: &UpdateArgs, config: &RuntimeConfig) -> Result<UpdateRequest> {
    let scheme = TagScheme::from_config(&config.install);
    let channel = Channel::from_request(
        args.channel.into(),
        args.branch.as_deref(),
        args.commit.as_deref(),
        &scheme,
    )?;

    let mut request = UpdateRequest::new(channel);
    if let Some(secs) = args.timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }
    Ok(request)
}

async fn update(args: UpdateArgs) -> Result<()> {
    let config = load_config()?;
    let request = request_from_args(&args, &config)?;

    let installation = InstallationState::detect(VersionInfo::current().release())?;
    let orchestrator = Orchestrator::from_config(&config, installation)?;

    let spinner = output::spinner(&format!("Resolving {} channel...", request.channel));
    let plan = orchestrator.plan(&request).await;
    spinner.finish_and_clear();
    let plan = plan?;

    if args.check {
        println!("{}", plan.check_message());
        return Ok(());
    }
    if plan.up_to_date {
        output::success(&plan.check_message());
        return Ok(());
    }

    if !args.yes && console::user_attended() && !confirm(&plan)? {
        output::info("Update cancelled");
        return Ok(());
    }

    let spinner = output::spinner(&format!("Installing bt {}...", plan.resolved));
    let report = orchestrator.apply(plan, &request).await;
    spinner.finish_and_clear();

    match report? {
        UpdateReport::Updated { result, .. } => print_result(&result),
        UpdateReport::UpToDate { plan } | UpdateReport::UpdateAvailable { plan } => {
            output::success(&plan.check_message())
        }
    }
    Ok(())
}

fn confirm(plan: &UpdatePlan) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Update bt from {} to {}?",
            plan.current, plan.resolved
        ))
        .default(true)
        .interact()?;
    Ok(confirmed)
}

fn print_result(result: &InstallResult) {
    output::success(&format!(
        "Updated bt {} -> {}",
        result.previous, result.installed
    ));
    output::kv("Location", &result.executable.display().to_string());

    if let Some(backup) = &result.backup {
        if result.backup_pending_removal {
            output::info(&format!(
                "{} is still in use and will be removed the next time bt runs",
                backup.display()
            ));
        } else {
            output::kv("Previous binary", &backup.display().to_string());
        }
    }

    if !result.path_visible {
        output::warning(&format!(
            "{} is not on your PATH; open a new shell or add it to PATH",
            result
                .executable
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ));
    } else if result.restart_required {
        output::info("Restart your shell to use the new version");
    }
}

/// Remove staging directories and backups left by an earlier update
///
/// Best effort: runs on every launch and never fails the command.
pub fn cleanup_on_launch() {
    let Ok(config) = load_config() else {
        return;
    };
    let Ok(installation) = InstallationState::detect(VersionInfo::current().release()) else {
        return;
    };

    let removed = InstallationManager::new(config.install).cleanup_previous(&installation);
    if removed > 0 {
        debug!("Removed {} leftover update files", removed);
    }
}
