//! Command-line interface for puzzle-forge.
//!
//! Provides `generate`, `batch` and `inspect`.

mod commands;

pub use commands::{inspect_candidate, parse_cli, run, run_with_cli, Cli, InspectReport};
