//! # pupgrade-core
//!
//! Versioned upgrades for Pion configuration bundles.
//!
//! A bundle is `platform.xml` plus every file it references: codecs,
//! databases, reactors, services, protocols, users, the vocabulary index
//! with its vocabularies, and a handful of fixed-name files that sit next
//! to the platform file. Every document carries a `pion_version` attribute
//! on its root element.
//!
//! ## Pipeline
//!
//! - `bundle` resolves and loads the whole set into memory
//! - `rule` / `rules` hold the ordered upgrade steps
//! - `upgrader` applies matching steps, then hands the result to
//!   `persistence` for backup and atomic rewrite
//!
//! Nothing touches disk until every rule has succeeded.

// =============================================================================
// MODULES
// =============================================================================

pub mod bundle;
pub mod document;
pub mod options;
pub mod persistence;
pub mod primitives;
pub mod report;
pub mod rule;
pub mod rules;
pub mod tag;
pub mod tree;
pub mod types;
pub mod upgrader;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{UpgradeError, Version};

// =============================================================================
// RE-EXPORTS: Documents
// =============================================================================

pub use bundle::{Bundle, ConfigFile, Location, PlatformPaths};
pub use document::{Document, StagedWrite};
pub use tag::{QualName, Tag};
pub use tree::{NodeId, NodeKind, Tree};

// =============================================================================
// RE-EXPORTS: Upgrade Engine
// =============================================================================

pub use options::{RunOptions, Strictness, Verbosity};
pub use persistence::BundleStore;
pub use primitives::CURRENT_VERSION;
pub use report::{Outcome, UpgradeReport};
pub use rule::{RuleRegistry, UpgradeRule, VersionPattern};
pub use rules::Upgrade30xTo31x;
pub use upgrader::Upgrader;
