//! Command-line interface for compkit.
//!
//! # Available Commands
//!
//! - `add` - Resolve a component, transform its files and install them into the project
//! - `list` - List the components a registry publishes
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - debug logging
//! - `--quiet` / `-q` - errors only
//!
//! `RUST_LOG` takes precedence over both flags when set.
//!
//! # Examples
//!
//! ```bash
//! compkit add dialog --registry ./registry --to src/components --alias @/registry/ui=./ui
//! compkit -v add button --version 1.2.0 --dry-run
//! compkit list --registry https://registry.example.com
//! ```

mod add;
mod list;

pub use add::AddCommand;
pub use list::ListCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Top-level command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "compkit",
    about = "Component registry client - install components and everything they depend on",
    version,
    long_about = "compkit resolves a component's dependency closure from a registry, rewrites \
                  the fetched sources to fit your project, and installs them all-or-nothing."
)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a component and its dependencies
    Add(AddCommand),
    /// List the components a registry publishes
    List(ListCommand),
}

impl Cli {
    /// Log filter directive selected by the global flags.
    fn log_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    /// Install the global tracing subscriber.
    ///
    /// Logs go to stderr so command output on stdout stays machine-readable.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_directive()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Any failure of the command; library failures carry a
    /// [`crate::core::CompkitError`] the caller can downcast to.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Add(cmd) => cmd.execute(self.quiet).await,
            Commands::List(cmd) => cmd.execute(self.quiet).await,
        }
    }
}
