//! # Built-in Rules
//!
//! Every configuration upgrade shipped with this build. Keep
//! [`builtin`] in version order and keep
//! [`CURRENT_VERSION`](crate::primitives::CURRENT_VERSION) equal to the last
//! target.

pub mod v3_1;

use crate::options::RunOptions;
use crate::rule::RuleRegistry;
use crate::types::UpgradeError;

pub use v3_1::Upgrade30xTo31x;

/// The registry of built-in rules, in evaluation order.
pub fn builtin() -> Result<RuleRegistry, UpgradeError> {
    let mut registry = RuleRegistry::new();
    registry.register(Upgrade30xTo31x::new()?);
    Ok(registry)
}

/// Handle an element a rule expected to edit around but could not find.
///
/// Strict runs fail the rule; lenient runs log and carry on.
pub(crate) fn anchor_missing(
    options: &RunOptions,
    rule: &str,
    what: &str,
) -> Result<(), UpgradeError> {
    if options.is_strict() {
        return Err(UpgradeError::transform(rule, format!("{what} not found")));
    }
    tracing::debug!("{} not found; skipping", what);
    Ok(())
}
