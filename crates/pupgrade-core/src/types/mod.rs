//! # Core Type Definitions
//!
//! This module contains the small value types shared by every layer of the
//! upgrade engine:
//! - Configuration version strings (`Version`)
//! - Error types (`UpgradeError`)
//!
//! ## Error Model
//!
//! Every failure is fatal to the run. Nothing is retried, and because all
//! writes are deferred until every rule has succeeded, an error surfacing
//! from any layer guarantees that no file on disk was touched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// VERSION
// =============================================================================

/// A configuration schema version, as stored in the `pion_version`
/// attribute of every document root (e.g. `"3.0.5"`).
///
/// Versions are compared only through rule applicability patterns, never
/// ordered numerically, so this stays an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub String);

impl Version {
    /// Create a new version from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while loading, transforming or saving a bundle.
///
/// - No silent failures
/// - Use `Result<T, UpgradeError>` for fallible operations
/// - The engine never panics; the binary maps every variant to exit status 1
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// A document's root element is not the expected namespace-qualified tag.
    #[error("Root element mismatch ({found} != {expected}) in {}", path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// A document's root element carries no version attribute.
    #[error("No version found in {}", path.display())]
    MissingVersion { path: PathBuf },

    /// A file referenced by another document could not be loaded.
    #[error("{referrer}: cannot load {}: {reason}", path.display())]
    UnresolvedReference {
        referrer: String,
        path: PathBuf,
        reason: String,
    },

    /// A path field the bundle needs is absent from a document.
    #[error("{document}: missing required field <{field}>")]
    MissingField { document: String, field: String },

    /// A rule's process phase failed.
    #[error("upgrade to {rule} failed: {reason}")]
    TransformFailure { rule: String, reason: String },

    /// A rule's applicability pattern is not a valid regular expression.
    #[error("invalid version pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// XML syntax or serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// A filesystem operation failed while backing up or saving.
    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl UpgradeError {
    /// Build an `Io` error from a path and any displayable cause.
    pub fn io(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Build a `TransformFailure` for the rule targeting `rule`.
    pub fn transform(rule: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::TransformFailure {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
