//! # Upgrade Report
//!
//! Summary of one run, returned by [`crate::Upgrader::run`] and rendered by
//! the binary as text or JSON.

use crate::types::Version;
use serde::Serialize;
use std::path::PathBuf;

/// What the run did with the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// No rule matched; nothing was written.
    UpToDate,
    /// At least one rule fired and the bundle was saved (unless dry run).
    Upgraded {
        /// Set when the bundle was overwritten in place.
        backup_dir: Option<PathBuf>,
        /// Set when the bundle was saved to a new directory.
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub config_dir: PathBuf,
    pub original_version: Version,
    pub final_version: Version,
    /// Target versions of the rules that fired, in order.
    pub applied: Vec<Version>,
    pub dry_run: bool,
    pub outcome: Outcome,
}

impl UpgradeReport {
    #[must_use]
    pub fn is_upgraded(&self) -> bool {
        matches!(self.outcome, Outcome::Upgraded { .. })
    }
}
