//! CLI argument parsing with clap

use bt_update::ChannelName;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// bt - Braintrust command-line interface
#[derive(Parser, Debug)]
#[command(name = "bt")]
#[command(author, version = crate::version::RELEASE_TAG, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Manage the bt installation itself
    #[command(name = "self", subcommand)]
    SelfManage(SelfCommands),
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Self commands
#[derive(Subcommand, Debug)]
pub enum SelfCommands {
    /// Update bt in place from its release channel
    Update(UpdateArgs),
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Check for updates without installing
    #[arg(long)]
    pub check: bool,

    /// Release channel to follow
    #[arg(long, value_enum, default_value_t = ChannelArg::Stable)]
    pub channel: ChannelArg,

    /// Canary builds of this branch instead of the main branch
    #[arg(long)]
    pub branch: Option<String>,

    /// Exact canary build for this commit (at least 7 hex characters)
    #[arg(long)]
    pub commit: Option<String>,

    /// Give up on resolving and downloading after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelArg {
    Stable,
    Canary,
}

impl From<ChannelArg> for ChannelName {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Stable => ChannelName::Stable,
            ChannelArg::Canary => ChannelName::Canary,
        }
    }
}
