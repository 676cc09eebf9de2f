//! Command-line interface for the parklands extraction pipeline.
#![forbid(unsafe_code)]

mod error;
mod extract;

pub use error::CliError;

use clap::{Parser, Subcommand};

use extract::ExtractArgs;

/// Run the parklands CLI with the current process arguments and environment.
///
/// # Errors
///
/// Any argument, configuration or pipeline failure; recovered per-country
/// fetch failures are logged and do not surface here.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Extract(args) => extract::run_extract(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "parklands",
    about = "Extract protected-area features into a layered GeoPackage",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch protected areas for every country and write the layered output.
    Extract(ExtractArgs),
}
