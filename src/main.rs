//! compkit CLI entry point
//!
//! Parses arguments, installs the tracing subscriber, runs the command and renders any
//! failure with its pipeline stage and a suggestion.

use anyhow::Result;
use clap::Parser;
use compkit_cli::cli;
use compkit_cli::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    cli.init_logging();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
