//! # pupgrade CLI Module
//!
//! Argument surface of the upgrade tool.
//!
//! ```text
//! pupgrade [OPTIONS] <CONFIG_PATH>
//!
//!   -o, --output <DIR>   write the upgraded bundle here instead of in place
//!   -t, --test           dry run: transform in memory, write nothing
//!   -v, --verbose        per-file and per-entity detail
//!   -q, --quiet          fatal errors only (wins over --verbose)
//!       --strict         fail when an expected element is missing
//!       --json           print the upgrade report as JSON
//! ```

mod commands;

use clap::Parser;
use pupgrade_core::{RunOptions, Strictness, UpgradeError, Upgrader, Verbosity};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Upgrade a Pion configuration directory to the current version.
#[derive(Parser, Debug)]
#[command(name = "pupgrade")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration directory (the one holding platform.xml)
    pub config_path: PathBuf,

    /// Save the upgraded configuration to this directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Dry run: perform every transform but write nothing
    #[arg(short, long)]
    pub test: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only report fatal errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Fail instead of skipping when an element a rule edits around is missing
    #[arg(long)]
    pub strict: bool,

    /// Print the upgrade report in JSON format
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// The run options this invocation asks for.
    #[must_use]
    pub fn to_options(&self) -> RunOptions {
        let strictness = if self.strict {
            Strictness::Strict
        } else {
            Strictness::Lenient
        };
        RunOptions::new()
            .with_dry_run(self.test)
            .with_verbosity(self.verbosity())
            .with_output(self.output.clone())
            .with_strictness(strictness)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Run the upgrade described by `cli` and print its report.
pub fn execute(cli: &Cli) -> Result<(), UpgradeError> {
    let options = cli.to_options();
    let upgrader = Upgrader::with_builtin_rules(options)?;
    let report = upgrader.run(&cli.config_path)?;

    if cli.json {
        println!("{}", render_json(&report));
    } else if cli.verbosity() != Verbosity::Quiet {
        print!("{}", render_text(&report));
    }
    Ok(())
}
