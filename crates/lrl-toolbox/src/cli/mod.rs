//! Command-line interface for lrl-toolbox.
//!
//! This module provides the CLI structure for the `lrl` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CircularCommand, ConfigCommand, FormatArg, InsertCommand, NanPolicyArg, TreeCommand,
    WinsorizeCommand,
};

/// lrl - data preprocessing and file tree storage
///
/// Winsorize or circularly encode CSV columns, and store data files in a
/// locked, index-addressed directory tree.
#[derive(Debug, Parser)]
#[command(name = "lrl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tree root directory (overrides configuration)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Work with a file tree
    #[command(subcommand)]
    Tree(TreeCommand),

    /// Clip CSV columns to quantiles
    Winsorize(WinsorizeCommand),

    /// Encode periodic CSV columns as cos/sin pairs
    Circular(CircularCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "lrl");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["lrl", "-q", "config", "path"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["lrl", "config", "path"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["lrl", "-v", "config", "path"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["lrl", "-vv", "config", "path"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_tree_init() {
        let cli = parse(&[
            "lrl",
            "--root",
            "/tmp/t",
            "tree",
            "init",
            "--format",
            "csv",
            "--no-metadata",
        ]);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/t")));
        assert!(matches!(
            cli.command,
            Command::Tree(TreeCommand::Init {
                format: Some(FormatArg::Csv),
                no_metadata: true,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_negative_get() {
        let cli = parse(&["lrl", "tree", "get", "-1"]);
        assert!(matches!(
            cli.command,
            Command::Tree(TreeCommand::Get { index: -1, .. })
        ));
    }

    #[test]
    fn test_parse_list_reverse() {
        let cli = parse(&["lrl", "tree", "list", "--step", "-2"]);
        assert!(matches!(
            cli.command,
            Command::Tree(TreeCommand::List { step: -2, start: None, stop: None })
        ));
    }

    #[test]
    fn test_parse_insert_requires_files() {
        assert!(Cli::try_parse_from(["lrl", "tree", "insert"]).is_err());
        let cli = parse(&["lrl", "tree", "insert", "a.json", "b.csv"]);
        match cli.command {
            Command::Tree(TreeCommand::Insert(cmd)) => assert_eq!(cmd.files.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_circular_periods() {
        let cli = parse(&["lrl", "circular", "in.csv", "--period", "24,7"]);
        match cli.command {
            Command::Circular(cmd) => assert_eq!(cmd.period, Some(vec![24.0, 7.0])),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_winsorize() {
        let cli = parse(&["lrl", "winsorize", "in.csv", "--low", "0.05", "--nan-policy", "raise"]);
        match cli.command {
            Command::Winsorize(cmd) => {
                assert_eq!(cmd.low, Some(0.05));
                assert_eq!(cmd.high, None);
                assert_eq!(cmd.nan_policy, Some(NanPolicyArg::Raise));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["lrl", "-c", "/custom/config.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}
