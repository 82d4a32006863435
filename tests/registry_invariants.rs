//! Provider Registry Invariant Tests
//!
//! - Names are unique; a duplicate registration fails and keeps the first
//! - Lookup returns exactly the registered table (identity, not a copy)
//! - Missing names fail unless the caller tolerates the miss
//! - An untouched registry behaves like one without the name

use std::thread;

use aeroscan::custom_scan::{
    get_custom_scan_methods, global_registry, register_custom_scan_methods, CustomScan,
    CustomScanError, CustomScanErrorCode, CustomScanResult, ExecMethods, ScanPlanMethods,
    ScanProviderRegistry, Severity,
};

// =============================================================================
// Test Utilities
// =============================================================================

struct Table {
    name: &'static str,
}

impl ScanPlanMethods for Table {
    fn name(&self) -> &str {
        self.name
    }

    fn create_custom_scan_state(
        &self,
        _cscan: &CustomScan,
    ) -> CustomScanResult<Box<dyn ExecMethods>> {
        Err(CustomScanError::scan_failed(self.name, "registry fixture"))
    }
}

static ALPHA: Table = Table { name: "registry_alpha" };
static ALPHA_AGAIN: Table = Table { name: "registry_alpha" };
static BETA: Table = Table { name: "registry_beta" };

fn same(a: &dyn ScanPlanMethods, b: &dyn ScanPlanMethods) -> bool {
    std::ptr::addr_eq(a, b)
}

// =============================================================================
// Tests
// =============================================================================

/// Registration, duplicate rejection and identity are checked in one test
/// so the outcome does not depend on test ordering within the binary.
#[test]
fn test_register_duplicate_and_lookup_identity() {
    register_custom_scan_methods(&ALPHA).unwrap();

    let err = register_custom_scan_methods(&ALPHA_AGAIN).unwrap_err();
    assert_eq!(err.code(), CustomScanErrorCode::AeroDuplicateObject);
    assert_eq!(err.severity(), Severity::Error);
    assert_eq!(
        err.to_string(),
        "[ERROR] AERO_DUPLICATE_OBJECT: custom scan provider \"registry_alpha\" already exists"
    );

    let found = get_custom_scan_methods("registry_alpha", false)
        .unwrap()
        .unwrap();
    assert!(same(found, &ALPHA));
    assert!(!same(found, &ALPHA_AGAIN));
}

#[test]
fn test_missing_name() {
    assert!(get_custom_scan_methods("registry_missing", true)
        .unwrap()
        .is_none());

    let err = get_custom_scan_methods("registry_missing", false).unwrap_err();
    assert_eq!(err.code(), CustomScanErrorCode::AeroUndefinedObject);
    assert_eq!(
        err.message(),
        "custom scan provider \"registry_missing\" was not registered"
    );
    assert_eq!(err.provider(), Some("registry_missing"));
}

#[test]
fn test_untouched_registry_is_empty() {
    let registry = ScanProviderRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.names().unwrap().is_empty());
    assert!(registry.lookup("registry_alpha", true).unwrap().is_none());
    assert_eq!(
        registry.lookup("registry_alpha", false).unwrap_err().code(),
        CustomScanErrorCode::AeroUndefinedObject
    );
}

#[test]
fn test_registries_are_independent() {
    let registry = ScanProviderRegistry::new();
    registry.register(&ALPHA).unwrap();
    registry.register(&BETA).unwrap();
    assert_eq!(registry.len(), 2);

    // A private registry never leaks into the process-wide one.
    assert!(global_registry()
        .lookup("registry_beta", true)
        .unwrap()
        .is_none());
}

#[test]
fn test_lookups_from_many_threads_see_one_table() {
    let registry = ScanProviderRegistry::new();
    registry.register(&BETA).unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..100 {
                    let found = registry.lookup("registry_beta", false).unwrap().unwrap();
                    assert!(same(found, &BETA));
                }
            });
        }
    });
}

#[test]
fn test_concurrent_duplicate_registration_has_one_winner() {
    static RACERS: [Table; 4] = [
        Table { name: "registry_race" },
        Table { name: "registry_race" },
        Table { name: "registry_race" },
        Table { name: "registry_race" },
    ];
    let registry = ScanProviderRegistry::new();

    let wins: usize = thread::scope(|s| {
        let handles: Vec<_> = RACERS
            .iter()
            .map(|table| {
                let registry = &registry;
                s.spawn(move || registry.register(table).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum()
    });

    assert_eq!(wins, 1);
    assert_eq!(registry.len(), 1);
}
