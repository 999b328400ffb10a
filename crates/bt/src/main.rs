//! bt CLI - Braintrust command-line interface
//!
//! This is the main entry point for the bt command-line interface.

mod cli;
mod commands;
mod output;
mod version;

use anyhow::Error;
use bt_update::UpdateError;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    // Leftovers from an interrupted or Windows update
    commands::self_cmd::cleanup_on_launch();

    // Run command
    let result = match cli.command {
        Commands::Version(args) => commands::version::run(args),
        Commands::SelfManage(cmd) => commands::self_cmd::run(cmd).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&format!("{:#}", err));
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Process exit code for a failed command
///
/// Update failures carry their own code; anything else exits with 1.
fn exit_code(err: &Error) -> u8 {
    err.downcast_ref::<UpdateError>()
        .and_then(|update| u8::try_from(update.exit_code()).ok())
        .unwrap_or(1)
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
