//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroconf inspect --snapshot <path> [--no-policies]
//! - aeroconf summary --snapshot <path>
//! - aeroconf tolerance --snapshot <path> [--dc <id>]
//! - aeroconf apply --snapshot <path> [--set k=v]... [--clear range]... [--output <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aeroconf - inspect and edit database replication configurations
#[derive(Parser, Debug)]
#[command(name = "aeroconf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to tool configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the structured export of a snapshot
    Inspect {
        /// Snapshot file (JSON object or binary)
        #[arg(long)]
        snapshot: PathBuf,

        /// Omit replication policies from the export
        #[arg(long)]
        no_policies: bool,
    },

    /// Print a human-readable summary
    Summary {
        /// Snapshot file (JSON object or binary)
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Print derived fault-tolerance numbers
    Tolerance {
        /// Snapshot file (JSON object or binary)
        #[arg(long)]
        snapshot: PathBuf,

        /// Datacenter to evaluate region-specific numbers for
        #[arg(long)]
        dc: Option<String>,
    },

    /// Apply edits to a snapshot and write the result
    Apply {
        /// Snapshot file (JSON object or binary)
        #[arg(long)]
        snapshot: PathBuf,

        /// Set a key: `suffix=value` or `<full key>=value`
        #[arg(long = "set", value_name = "KEY=VALUE")]
        sets: Vec<String>,

        /// Clear a key, or a range written `begin..end`
        #[arg(long = "clear", value_name = "RANGE")]
        clears: Vec<String>,

        /// Where to write the result (defaults to the input file)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
