//! CLI argument definitions

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "schemawalk")]
#[command(author, version, about = "Walk SQL scripts through a schema snapshot")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that SQL files apply cleanly to a schema snapshot
    Check {
        /// SQL files to check (supports glob patterns)
        files: Vec<PathBuf>,

        #[command(flatten)]
        walk: WalkArgs,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Path to a schemawalk.toml file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Walk SQL files and print the resulting catalog as a JSON snapshot
    Dump {
        /// SQL files to apply in order (supports glob patterns)
        files: Vec<PathBuf>,

        #[command(flatten)]
        walk: WalkArgs,

        /// Path to a schemawalk.toml file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Split a SQL file into statements and print their line spans
    Split {
        /// SQL file to split
        file: PathBuf,

        /// SQL dialect
        #[arg(short, long, default_value = "postgresql")]
        dialect: String,
    },
}

/// Options shared by commands that run the walk-through
#[derive(ClapArgs, Default)]
pub struct WalkArgs {
    /// JSON schema snapshot to start from
    #[arg(short, long, value_name = "FILE", env = "SCHEMAWALK_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// SQL dialect (postgresql, mysql, tidb, oracle)
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Tolerate references to objects missing from the snapshot
    #[arg(long)]
    pub no_check_integrity: bool,

    /// Maximum number of keys per index
    #[arg(long, value_name = "N")]
    pub max_index_keys: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
    /// SARIF output (for GitHub Code Scanning)
    Sarif,
}
