//! Errors surfaced by the `aeroscan` binary
//!
//! Every variant ends the process with a non-zero status. Failures raised
//! through the custom scan contract keep their inner `AERO_*` code in the
//! message so the provider-level cause survives the CLI boundary.

use std::fmt;
use std::io;

use crate::custom_scan::CustomScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// `aeroscan.json` unreadable, malformed or out of bounds
    ConfigError,
    /// Writing the report to stdout failed
    IoError,
    /// Planning or executing the scan failed
    ScanError,
    /// A parallel worker thread panicked
    WorkerFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            CliErrorCode::ConfigError => "AERO_CLI_CONFIG_ERROR",
            CliErrorCode::IoError => "AERO_CLI_IO_ERROR",
            CliErrorCode::ScanError => "AERO_CLI_SCAN_ERROR",
            CliErrorCode::WorkerFailed => "AERO_CLI_WORKER_FAILED",
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(detail: impl Into<String>) -> Self {
        CliError::new(CliErrorCode::ConfigError, detail)
    }

    pub fn io_error(detail: impl Into<String>) -> Self {
        CliError::new(CliErrorCode::IoError, detail)
    }

    /// Worker `worker` (0-based) did not return a result
    pub fn worker_failed(worker: usize) -> Self {
        CliError::new(
            CliErrorCode::WorkerFailed,
            format!("parallel worker {} panicked", worker),
        )
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::io_error(format!("report JSON: {}", e))
    }
}

impl From<CustomScanError> for CliError {
    fn from(e: CustomScanError) -> Self {
        CliError::new(CliErrorCode::ScanError, e.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;
