//! Report rendering for the upgrade command.

use pupgrade_core::{Outcome, UpgradeReport};
use std::fmt::Write;

// =============================================================================
// JSON
// =============================================================================

/// Pretty JSON form of the report.
#[must_use]
pub fn render_json(report: &UpgradeReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_default()
}

// =============================================================================
// TEXT
// =============================================================================

/// Human-readable summary of the report, one field per line.
#[must_use]
pub fn render_text(report: &UpgradeReport) -> String {
    let mut out = String::new();

    if let Outcome::UpToDate = report.outcome {
        let _ = writeln!(
            out,
            "Configuration is up-to-date ({})",
            report.final_version
        );
        return out;
    }

    let _ = writeln!(out, "Pion Configuration Upgrade");
    let _ = writeln!(out, "==========================");
    let _ = writeln!(out, "Config:   {}", report.config_dir.display());
    let _ = writeln!(
        out,
        "Version:  {} -> {}",
        report.original_version, report.final_version
    );
    let applied: Vec<&str> = report.applied.iter().map(|v| v.as_str()).collect();
    let _ = writeln!(out, "Applied:  {}", applied.join(", "));

    if let Outcome::Upgraded {
        backup_dir,
        output_dir,
    } = &report.outcome
    {
        if let Some(dir) = backup_dir {
            let _ = writeln!(out, "Backup:   {}", dir.display());
        }
        if let Some(dir) = output_dir {
            let _ = writeln!(out, "Output:   {}", dir.display());
        }
    }

    if report.dry_run {
        let _ = writeln!(out);
        let _ = writeln!(out, "Dry run: no files were written.");
    }
    out
}
