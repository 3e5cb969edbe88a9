//! Command-line surface for `aq-agent [--config PATH] <command>`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default analysis window for `report`.
pub const DEFAULT_REPORT_DAYS: u32 = 7;

#[derive(Debug, Parser)]
#[command(name = "aq-agent")]
#[command(about = "Parse air-quality questions and review parser comparisons")]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// TOML config file (defaults plus AQ_* environment overrides when absent)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Parse a query and print the result as JSON
    Parse {
        /// Query words, joined with single spaces
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Analyze the comparison log and export a report
    Report {
        /// How many days back to include
        #[arg(default_value_t = DEFAULT_REPORT_DAYS)]
        days: u32,
    },

    /// Summarize the per-day comparison directory
    ShadowSummary,
}
