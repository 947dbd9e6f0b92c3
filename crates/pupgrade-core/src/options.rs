//! # Run Options
//!
//! The single immutable configuration value for one upgrade run. It is
//! built once by the caller and passed by reference to every operation
//! that needs it; nothing in the engine reads process-wide flags.

use serde::Serialize;
use std::path::PathBuf;

/// How much progress output the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Fatal errors only.
    Quiet,
    /// Progress messages.
    #[default]
    Normal,
    /// Per-file and per-entity detail.
    Verbose,
}

impl Verbosity {
    /// Resolve the `--quiet` / `--verbose` flag pair. Quiet wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Default `tracing` filter directive for this verbosity.
    #[must_use]
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

/// What a rule does when an element it expects to edit around is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Log the missing anchor and skip that edit.
    #[default]
    Lenient,
    /// Fail the rule with `TransformFailure`.
    Strict,
}

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Perform every in-memory transform but write nothing to disk.
    pub dry_run: bool,
    pub verbosity: Verbosity,
    /// Save the upgraded bundle here instead of overwriting in place.
    pub output: Option<PathBuf>,
    pub strictness: Strictness,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strictness == Strictness::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn defaults_are_lenient_and_writing() {
        let options = RunOptions::new();
        assert!(!options.dry_run);
        assert!(!options.is_strict());
        assert!(options.output.is_none());
        assert_eq!(options.verbosity.filter_directive(), "info");
    }
}
