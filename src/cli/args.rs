//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroscan providers [--config <path>]
//! - aeroscan scan --provider <name> [--parallel] [--backward] [--config <path>]
//! - aeroscan explain --provider <name> [--verbose] [--format text|json] [--config <path>]

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// aeroscan - pluggable scan providers for the AeroDB executor
#[derive(Parser, Debug)]
#[command(name = "aeroscan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered scan providers
    Providers {
        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Plan and run a scan through a provider, printing every tuple
    Scan {
        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Provider name
        #[arg(long)]
        provider: String,

        /// Split the scan across the configured number of workers
        #[arg(long)]
        parallel: bool,

        /// Scan backward
        #[arg(long)]
        backward: bool,
    },

    /// Print the EXPLAIN properties of a provider's scan node
    Explain {
        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Provider name
        #[arg(long)]
        provider: String,

        /// Include verbose properties
        #[arg(long)]
        verbose: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
