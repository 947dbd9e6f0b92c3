//! # pupgrade
//!
//! Command-line front end for `pupgrade-core`. The binary in `main.rs`
//! only installs logging and maps errors to exit status; argument handling
//! and report rendering live in [`cli`] so they can be tested directly.

pub mod cli;
