//! Configuration file (`aeroscan.json`)
//!
//! Every field is optional. Unknown fields are rejected.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::observability::Severity;

use super::errors::{CliError, CliResult};

/// Upper bound on `parallel_workers`
pub const MAX_PARALLEL_WORKERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Minimum log severity (trace, info, warn, error, fatal)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Workers used by `scan --parallel`
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,

    /// Rows served by `values_scan`
    #[serde(default = "default_rows")]
    pub rows: Vec<Vec<Value>>,

    /// Inclusive upper bound of `series_scan`
    #[serde(default = "default_series_stop")]
    pub series_stop: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_parallel_workers() -> usize {
    2
}
fn default_rows() -> Vec<Vec<Value>> {
    vec![
        vec![json!(1), json!("alpha")],
        vec![json!(2), json!("beta")],
        vec![json!(3), json!("gamma")],
    ]
}
fn default_series_stop() -> i64 {
    10
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            parallel_workers: default_parallel_workers(),
            rows: default_rows(),
            series_stop: default_series_stop(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: ScanConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `path`, or the defaults when no path is given
    pub fn load_or_default(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> CliResult<()> {
        self.severity()?;

        if self.parallel_workers == 0 || self.parallel_workers > MAX_PARALLEL_WORKERS {
            return Err(CliError::config_error(format!(
                "parallel_workers must be in 1..={}, got {}",
                MAX_PARALLEL_WORKERS, self.parallel_workers
            )));
        }

        if let Some(first) = self.rows.first() {
            if let Some(i) = self.rows.iter().position(|r| r.len() != first.len()) {
                return Err(CliError::config_error(format!(
                    "rows[{}] has {} columns, expected {}",
                    i,
                    self.rows[i].len(),
                    first.len()
                )));
            }
        }

        Ok(())
    }

    /// Configured minimum log severity
    pub fn severity(&self) -> CliResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            CliError::config_error(format!(
                "Invalid log_level: '{}'. Must be one of trace, info, warn, error, fatal.",
                self.log_level
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let file = write_config("{}");
        let config = ScanConfig::load(file.path()).unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.rows.len(), 3);
    }

    #[test]
    fn test_bad_log_level() {
        let file = write_config(r#"{"log_level": "loud"}"#);
        let err = ScanConfig::load(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_worker_bounds() {
        let file = write_config(r#"{"parallel_workers": 0}"#);
        assert!(ScanConfig::load(file.path()).is_err());
        let file = write_config(r#"{"parallel_workers": 65}"#);
        assert!(ScanConfig::load(file.path()).is_err());
        let file = write_config(r#"{"parallel_workers": 64}"#);
        assert!(ScanConfig::load(file.path()).is_ok());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let file = write_config(r#"{"rows": [[1, 2], [3]]}"#);
        assert!(ScanConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{"data_dir": "/tmp"}"#);
        assert!(ScanConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScanConfig::load(&dir.path().join("absent.json")).is_err());
        assert!(ScanConfig::load_or_default(None).is_ok());
    }
}
