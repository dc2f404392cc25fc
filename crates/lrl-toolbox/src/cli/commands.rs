//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// File tree commands.
#[derive(Debug, Subcommand)]
pub enum TreeCommand {
    /// Create a tree (or open an existing one) and print its layout
    Init {
        /// Bits per directory level
        #[arg(long)]
        leaf_depth: Option<u32>,

        /// Initial number of index groups
        #[arg(long)]
        tree_depth: Option<u32>,

        /// Data file format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Do not write metadata files
        #[arg(long)]
        no_metadata: bool,
    },

    /// Show layout and entry count
    Info {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Insert data files as new entries
    Insert(InsertCommand),

    /// Print one entry
    Get {
        /// Entry index; negative values count from the end
        #[arg(allow_negative_numbers = true)]
        index: i64,

        /// Write the data to this file instead of printing (format from extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print a slice of entries as JSON lines
    List {
        /// First index (inclusive)
        #[arg(long, allow_negative_numbers = true)]
        start: Option<i64>,

        /// Last index (exclusive)
        #[arg(long, allow_negative_numbers = true)]
        stop: Option<i64>,

        /// Step between indices
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        step: i64,
    },
}

/// Insert command arguments.
#[derive(Debug, Args)]
pub struct InsertCommand {
    /// Data files to insert (csv, json, yaml or msgpack)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// JSON object attached as metadata to every inserted entry
    #[arg(short, long, value_name = "JSON")]
    pub metadata: Option<String>,
}

/// Winsorize command arguments.
#[derive(Debug, Args)]
pub struct WinsorizeCommand {
    /// Input CSV with a header row
    pub input: PathBuf,

    /// Lower quantile (defaults to configuration)
    #[arg(long)]
    pub low: Option<f64>,

    /// Upper quantile (defaults to configuration)
    #[arg(long)]
    pub high: Option<f64>,

    /// NaN handling
    #[arg(long, value_enum)]
    pub nan_policy: Option<NanPolicyArg>,

    /// Output CSV (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Circular encoding command arguments.
#[derive(Debug, Args)]
pub struct CircularCommand {
    /// Input CSV with a header row
    pub input: PathBuf,

    /// Period per column, comma separated; learned from the data if omitted
    #[arg(short, long, value_delimiter = ',')]
    pub period: Option<Vec<f64>>,

    /// NaN handling
    #[arg(long, value_enum)]
    pub nan_policy: Option<NanPolicyArg>,

    /// Output CSV (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Data format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Comma separated values
    Csv,
    /// JSON
    Json,
    /// YAML
    Yaml,
    /// `MessagePack`
    Msgpack,
}

impl From<FormatArg> for crate::filetree::DataFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => Self::Csv,
            FormatArg::Json => Self::Json,
            FormatArg::Yaml => Self::Yaml,
            FormatArg::Msgpack => Self::Msgpack,
        }
    }
}

/// NaN policy argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NanPolicyArg {
    /// Keep NaN in the output
    Propagate,
    /// Fail on NaN
    Raise,
    /// Ignore NaN when fitting
    Omit,
}

impl From<NanPolicyArg> for crate::preprocessing::NanPolicy {
    fn from(arg: NanPolicyArg) -> Self {
        match arg {
            NanPolicyArg::Propagate => Self::Propagate,
            NanPolicyArg::Raise => Self::Raise,
            NanPolicyArg::Omit => Self::Omit,
        }
    }
}
