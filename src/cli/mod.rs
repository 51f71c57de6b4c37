//! CLI module for aeroconf
//!
//! Provides command-line interface for:
//! - inspect: Structured export of a snapshot
//! - summary: Human-readable summary
//! - tolerance: Derived fault-tolerance numbers
//! - apply: Edit a snapshot and report whether recovery is needed

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    apply, inspect, load_snapshot, run, run_command, save_snapshot, summary, tolerance,
    SnapshotFormat, ToolConfig,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_file, write_file, write_json, write_text};
