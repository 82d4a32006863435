//! CLI module for aeroscan
//!
//! Provides command-line interface for:
//! - providers: list registered scan providers
//! - scan: plan and run a scan, serially or across workers
//! - explain: print a scan node's EXPLAIN properties

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command, OutputFormat};
pub use commands::{
    ensure_builtin_providers, explain_scan, list_providers, run, run_command, run_scan,
    ScanOptions, ScanReport,
};
pub use config::{ScanConfig, MAX_PARALLEL_WORKERS};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_response, write_text};
