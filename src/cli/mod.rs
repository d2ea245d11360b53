//! Command-line interface for sortie.
//!
//! Provides the `run`, `sources` and `buckets` commands.

mod commands;

pub use commands::{Cli, Commands, run_command};
