//! CLI parse: clap types for restree. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Restree CLI - browse and reconcile a layered resource namespace
#[derive(Parser, Debug)]
#[command(name = "restree")]
#[command(about = "Mirror a layered resource namespace into a live directory tree")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where config/ is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Read-only data root (overrides roots.data_root)
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Writable user-data root (overrides roots.user_data_root)
    #[arg(long)]
    pub user_data_root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Populate the tree and print it
    Tree {
        /// Virtual path to populate from
        #[arg(default_value = "/")]
        root: String,
        /// Maximum depth to print
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List the files and directories of one directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Populate, then keep the tree in sync with filesystem changes
    Watch {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        seconds: Option<u64>,
        /// Maximum depth to print
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Move an entry into another directory
    Mv { source: String, dest_dir: String },
    /// Copy an entry into another directory
    Cp { source: String, dest_dir: String },
    /// Delete an entry from the user-data layer
    Rm { path: String },
    /// Rename an entry in place
    Rename { path: String, new_name: String },
    /// Show the effective configuration
    Config {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl Commands {
    /// Stable command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Tree { .. } => "tree",
            Commands::Ls { .. } => "ls",
            Commands::Watch { .. } => "watch",
            Commands::Mv { .. } => "mv",
            Commands::Cp { .. } => "cp",
            Commands::Rm { .. } => "rm",
            Commands::Rename { .. } => "rename",
            Commands::Config { .. } => "config",
        }
    }
}
