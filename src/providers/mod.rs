//! Built-in scan providers
//!
//! - `values_scan`: inline rows, every optional capability
//! - `series_scan`: integer series, required callbacks only

mod errors;
mod series;
mod values;

pub use errors::{ProviderError, ProviderResult};
pub use series::{
    series_path, SeriesPathMethods, SeriesPrivate, SeriesScanMethods, SERIES_PATH_METHODS,
    SERIES_SCAN_METHODS, SERIES_SCAN_NAME,
};
pub use values::{
    values_path, ValuesPathMethods, ValuesPrivate, ValuesScanMethods, VALUES_PATH_METHODS,
    VALUES_SCAN_METHODS, VALUES_SCAN_NAME,
};

use crate::custom_scan::{global_registry, CustomScanResult, ScanProviderRegistry};

/// Register the built-in providers in `registry`
pub fn register_builtin_providers_into(registry: &ScanProviderRegistry) -> CustomScanResult<()> {
    registry.register(&VALUES_SCAN_METHODS)?;
    registry.register(&SERIES_SCAN_METHODS)?;
    Ok(())
}

/// Register the built-in providers in the process-wide registry.
///
/// Call once at startup; a second call fails with a duplicate error.
pub fn register_builtin_providers() -> CustomScanResult<()> {
    register_builtin_providers_into(global_registry())
}
