//! ---
//! ss_section: "05-external-interfaces"
//! ss_subsection: "binary"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Operator CLI for license keys and quota decisions."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{Parser, Subcommand};
use sstack_logging as logging;

mod license;
mod quota;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "sstack license inspection utility",
    long_about = None
)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Decode a license key without verifying it.
    Inspect(license::InspectCommand),
    /// Verify and register a license key against an isolated registry.
    Verify(license::VerifyCommand),
    /// Evaluate a free-tier quota decision.
    Quota(quota::QuotaCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with(if cli.json_logs {
        logging::LogFormat::Json
    } else {
        logging::LogFormat::Pretty
    });
    match cli.command {
        Commands::Inspect(cmd) => cmd.execute()?,
        Commands::Verify(cmd) => cmd.execute()?,
        Commands::Quota(cmd) => cmd.execute()?,
    }
    Ok(())
}
