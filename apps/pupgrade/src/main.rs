//! # pupgrade
//!
//! Upgrades a Pion configuration directory in place (or into `--output`)
//! to the version this build ships with.
//!
//! ## Usage
//!
//! ```bash
//! # Upgrade in place, backing up to <dir>/backup-<old version>
//! pupgrade /etc/pion
//!
//! # See what would change without writing anything
//! pupgrade --test --verbose /etc/pion
//!
//! # Write the upgraded copy somewhere else
//! pupgrade -o /tmp/pion-upgraded /etc/pion
//! ```

use clap::Parser;
use pupgrade::cli::{self, Cli};
use pupgrade_core::Verbosity;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version arrive here too and go to stdout.
            let code = i32::from(e.use_stderr());
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbosity());

    if let Err(e) = cli::execute(&cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber. PUPGRADE_LOG_FORMAT=json enables
/// machine-parseable output; RUST_LOG overrides the verbosity flags.
fn init_tracing(verbosity: Verbosity) {
    let log_format = std::env::var("PUPGRADE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| verbosity.filter_directive().into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}
