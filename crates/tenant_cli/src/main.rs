//! tenantkit CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: Document error (includes, keywords, resource shape)
//! - 4: Dump failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tenant_context::ContextError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const DOCUMENT_ERROR: u8 = 3;
    pub const DUMP_FAILURE: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // `tenant` matches the binary and every library crate target.
    let default_filter = if cli.verbose {
        "tenant=debug,warn"
    } else if cli.quiet {
        "warn"
    } else {
        "tenant=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Load(args) => commands::load::execute(args).await,
        Commands::Dump(args) => commands::dump::execute(args).await,
        Commands::Check(args) => commands::check::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<ContextError>() {
        Some(ContextError::Document(_)) | Some(ContextError::Load { .. }) => {
            ExitCodes::DOCUMENT_ERROR
        }
        Some(ContextError::DumpFailed { .. }) => ExitCodes::DUMP_FAILURE,
        Some(ContextError::InvalidConfig { .. }) => ExitCodes::INVALID_ARGS,
        Some(_) => ExitCodes::GENERAL_ERROR,
        None if e.is::<commands::ArgumentError>() => ExitCodes::INVALID_ARGS,
        None => ExitCodes::GENERAL_ERROR,
    }
}
