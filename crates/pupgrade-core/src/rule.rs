//! # Upgrade Rules
//!
//! A rule moves a bundle from every version its pattern matches to one
//! target version. Rules run through a fixed three-phase lifecycle:
//!
//! 1. `start`   - informational; must not mutate
//! 2. `process` - the only phase allowed to edit document trees
//! 3. `finish`  - stamps the target version across the whole bundle
//!
//! `finish` runs only if `process` succeeded. A rule keeps no state between
//! runs, and `process` works purely in memory, so a failed rule can be
//! retried from scratch after reloading the bundle from disk.

use crate::bundle::Bundle;
use crate::options::RunOptions;
use crate::types::{UpgradeError, Version};
use regex::Regex;
use std::fmt;

// =============================================================================
// VERSION PATTERN
// =============================================================================

/// Applicability test over the bundle's current version string.
///
/// Matching is unanchored; write `^...$` to match the whole version.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    regex: Regex,
}

impl VersionPattern {
    pub fn new(pattern: &str) -> Result<Self, UpgradeError> {
        Regex::new(pattern)
            .map(|regex| Self { regex })
            .map_err(|e| UpgradeError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.regex.is_match(version.as_str())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RULE TRAIT
// =============================================================================

/// A versioned transformation over a [`Bundle`].
pub trait UpgradeRule {
    /// Version the bundle carries after this rule.
    fn target_version(&self) -> &Version;

    /// Versions this rule upgrades from.
    fn pattern(&self) -> &VersionPattern;

    /// True if this rule should run against a bundle at `version`.
    fn applies_to(&self, version: &Version) -> bool {
        self.pattern().matches(version)
    }

    /// Called before `process`.
    fn start(&self, bundle: &Bundle, _options: &RunOptions) {
        tracing::info!(
            "upgrading from {} to {}",
            bundle.version(),
            self.target_version()
        );
    }

    /// Edit the bundle's documents in memory.
    fn process(&self, bundle: &mut Bundle, options: &RunOptions) -> Result<(), UpgradeError>;

    /// Called after a successful `process`.
    fn finish(&self, bundle: &mut Bundle, _options: &RunOptions) {
        bundle.set_version_all(self.target_version());
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Ordered set of rules. Registration order is evaluation order.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn UpgradeRule>>,
}

impl RuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; it runs after every rule registered before it.
    pub fn register(&mut self, rule: impl UpgradeRule + 'static) -> &mut Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn UpgradeRule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Target of the last registered rule.
    #[must_use]
    pub fn latest_version(&self) -> Option<&Version> {
        self.rules.last().map(|rule| rule.target_version())
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.rules
                    .iter()
                    .map(|r| format!("{} -> {}", r.pattern(), r.target_version())),
            )
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
