//! Built-in provider errors
//!
//! Provider-internal failures. They cross the scan contract as
//! `AERO_SCAN_FAILED` with the provider name attached.

use thiserror::Error;

use crate::custom_scan::CustomScanError;

/// Result type for provider internals
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("invalid private data: {0}")]
    InvalidPrivate(String),

    #[error("target column {column} out of range for {width}-column rows")]
    ColumnOutOfRange { column: usize, width: usize },

    #[error("provider takes no child plans, got {0}")]
    UnexpectedChildPlans(usize),

    #[error("mark/restore is unavailable while attached to shared state")]
    MarkWhileParallel,

    #[error("restore_pos without a saved position")]
    NoMark,

    #[error("shared region too small: need {need} bytes, have {have}")]
    SharedRegionTooSmall { need: usize, have: usize },

    #[error("shared state describes {shared} rows, local plan has {local}")]
    SharedStateMismatch { shared: u64, local: u64 },
}

impl ProviderError {
    /// Surface through the scan contract on behalf of `provider`
    pub fn into_scan_error(self, provider: &str) -> CustomScanError {
        CustomScanError::scan_failed(provider, format!("{}: {}", provider, self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_scan::CustomScanErrorCode;

    #[test]
    fn test_into_scan_error() {
        let err = ProviderError::ColumnOutOfRange { column: 3, width: 2 }.into_scan_error("values_scan");
        assert_eq!(err.code(), CustomScanErrorCode::AeroScanFailed);
        assert_eq!(err.provider(), Some("values_scan"));
        assert_eq!(
            err.message(),
            "values_scan: target column 3 out of range for 2-column rows"
        );
    }
}
