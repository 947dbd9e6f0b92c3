//! # Upgrader
//!
//! Runs the rule registry over a bundle and commits the result.
//!
//! ## Run Sequence
//!
//! ```text
//! open bundle ─► for each rule (registration order):
//!                  pattern matches current version?
//!                    start ─► process ─► finish (stamps version)
//!             ─► none fired: report up-to-date, write nothing
//!             ─► some fired: relocate (--output) or back up to
//!                            backup-<original version>, then save all
//! ```
//!
//! Any error before the commit step leaves every file untouched.

use crate::bundle::Bundle;
use crate::options::RunOptions;
use crate::persistence::BundleStore;
use crate::primitives::backup_dir_name;
use crate::report::{Outcome, UpgradeReport};
use crate::rule::{RuleRegistry, UpgradeRule};
use crate::rules;
use crate::types::{UpgradeError, Version};
use std::path::Path;

/// Orchestrates one upgrade run.
#[derive(Debug)]
pub struct Upgrader {
    registry: RuleRegistry,
    options: RunOptions,
}

impl Upgrader {
    #[must_use]
    pub fn new(registry: RuleRegistry, options: RunOptions) -> Self {
        Self { registry, options }
    }

    /// An upgrader carrying every rule shipped with this build.
    pub fn with_builtin_rules(options: RunOptions) -> Result<Self, UpgradeError> {
        Ok(Self::new(rules::builtin()?, options))
    }

    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    #[must_use]
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Apply every matching rule to `bundle` in memory.
    ///
    /// Each rule's applicability is tested against the version left by the
    /// rules before it. Returns the target versions of the rules that fired.
    pub fn apply(&self, bundle: &mut Bundle) -> Result<Vec<Version>, UpgradeError> {
        let mut applied = Vec::new();
        for rule in self.registry.iter() {
            if !rule.applies_to(bundle.version()) {
                tracing::debug!(
                    "skipping rule {} -> {} for version {}",
                    rule.pattern(),
                    rule.target_version(),
                    bundle.version()
                );
                continue;
            }
            run_rule(rule, bundle, &self.options)?;
            applied.push(rule.target_version().clone());
        }
        Ok(applied)
    }

    /// Write an upgraded bundle: relocate it when an output directory is
    /// configured, otherwise back up the originals under
    /// `backup-<original>`. Then save every document.
    pub fn commit(&self, bundle: &mut Bundle, original: &Version) -> Result<Outcome, UpgradeError> {
        let store = BundleStore::new(&self.options);

        let outcome = match &self.options.output {
            Some(output) => {
                store.relocate(bundle, output)?;
                Outcome::Upgraded {
                    backup_dir: None,
                    output_dir: Some(output.clone()),
                }
            }
            None => {
                let backup = bundle.base_dir().join(backup_dir_name(original.as_str()));
                store.backup_all(bundle, &backup)?;
                Outcome::Upgraded {
                    backup_dir: Some(backup),
                    output_dir: None,
                }
            }
        };

        store.persist_all(bundle)?;
        Ok(outcome)
    }

    /// Open the bundle in `config_dir`, upgrade it and commit the result.
    pub fn run(&self, config_dir: impl AsRef<Path>) -> Result<UpgradeReport, UpgradeError> {
        let config_dir = config_dir.as_ref();
        let mut bundle = Bundle::open(config_dir)?;
        let original = bundle.version().clone();

        let applied = self.apply(&mut bundle)?;

        let outcome = if applied.is_empty() {
            tracing::info!("configuration is up-to-date ({})", original);
            Outcome::UpToDate
        } else {
            self.commit(&mut bundle, &original)?
        };

        Ok(UpgradeReport {
            config_dir: config_dir.to_path_buf(),
            original_version: original,
            final_version: bundle.version().clone(),
            applied,
            dry_run: self.options.dry_run,
            outcome,
        })
    }
}

/// Run one rule's lifecycle. Errors from `process` become
/// `TransformFailure` tagged with the rule's target version.
fn run_rule(
    rule: &dyn UpgradeRule,
    bundle: &mut Bundle,
    options: &RunOptions,
) -> Result<(), UpgradeError> {
    rule.start(bundle, options);
    rule.process(bundle, options).map_err(|e| match e {
        e @ UpgradeError::TransformFailure { .. } => e,
        other => UpgradeError::transform(rule.target_version(), other.to_string()),
    })?;
    rule.finish(bundle, options);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
