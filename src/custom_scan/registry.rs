//! Custom scan provider registry
//!
//! Process-wide name → `ScanPlanMethods` store.
//!
//! - The store is created on the first registration (capacity hint 100)
//! - Names are unique; a second registration under a name fails and leaves
//!   the first entry untouched
//! - Entries are permanent: there is no unregister
//! - Tables are `&'static`: the registry never copies or frees them
//!
//! Registration happens during single-threaded initialization; once it is
//! done, lookups may run concurrently from any number of executor threads.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::observability::{log_event_with_fields, Event};

use super::errors::{CustomScanError, CustomScanResult};
use super::methods::ScanPlanMethods;

/// Maximum provider name length in bytes
pub const CUSTOM_NAME_MAX_LEN: usize = 64;

/// Initial capacity of the store
const REGISTRY_CAPACITY_HINT: usize = 100;

type ProviderMap = HashMap<String, &'static dyn ScanPlanMethods>;

static CUSTOM_SCAN_METHODS: ScanProviderRegistry = ScanProviderRegistry::new();

/// Name-keyed store of provider tables
pub struct ScanProviderRegistry {
    /// `None` until the first registration
    entries: RwLock<Option<ProviderMap>>,
}

impl ScanProviderRegistry {
    /// Create an empty, uninitialized registry
    pub const fn new() -> Self {
        Self {
            entries: RwLock::new(None),
        }
    }

    /// Register a provider table under its name.
    ///
    /// Fails with `AERO_DUPLICATE_OBJECT` if the name is already taken.
    ///
    /// # Panics
    ///
    /// In debug builds, if the name is longer than [`CUSTOM_NAME_MAX_LEN`].
    pub fn register(&self, methods: &'static dyn ScanPlanMethods) -> CustomScanResult<()> {
        let name = methods.name();
        debug_assert!(
            name.len() <= CUSTOM_NAME_MAX_LEN,
            "custom scan provider name \"{}\" exceeds {} bytes",
            name,
            CUSTOM_NAME_MAX_LEN
        );

        let mut guard = self.write()?;
        let entries = guard.get_or_insert_with(|| HashMap::with_capacity(REGISTRY_CAPACITY_HINT));

        if entries.contains_key(name) {
            log_event_with_fields(Event::ProviderDuplicate, &[("provider", name)]);
            return Err(CustomScanError::duplicate_object(name));
        }
        entries.insert(name.to_string(), methods);

        log_event_with_fields(
            Event::ProviderRegistered,
            &[("provider", name), ("registered", &entries.len().to_string())],
        );
        Ok(())
    }

    /// Look up a provider table by name.
    ///
    /// On a miss, returns `Ok(None)` when `missing_ok` is true and
    /// `AERO_UNDEFINED_OBJECT` otherwise. A registry that never saw a
    /// registration behaves exactly like one without a matching entry.
    pub fn lookup(
        &self,
        name: &str,
        missing_ok: bool,
    ) -> CustomScanResult<Option<&'static dyn ScanPlanMethods>> {
        let found = self
            .read()?
            .as_ref()
            .and_then(|entries| entries.get(name).copied());

        match found {
            Some(methods) => Ok(Some(methods)),
            None if missing_ok => Ok(None),
            None => {
                log_event_with_fields(Event::ProviderUndefined, &[("provider", name)]);
                Err(CustomScanError::undefined_object(name))
            }
        }
    }

    /// Registered names in sorted order
    pub fn names(&self) -> CustomScanResult<Vec<String>> {
        let mut names: Vec<String> = self
            .read()?
            .as_ref()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    /// Number of registered providers
    ///
    /// A poisoned registry counts as empty; `lookup` and `names` report it
    /// as `AERO_INTERNAL` instead.
    pub fn len(&self) -> usize {
        self.read()
            .map(|guard| guard.as_ref().map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the backing store has been created
    pub fn is_initialized(&self) -> bool {
        self.read().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn read(&self) -> CustomScanResult<RwLockReadGuard<'_, Option<ProviderMap>>> {
        self.entries
            .read()
            .map_err(|_| CustomScanError::internal("custom scan registry lock poisoned"))
    }

    fn write(&self) -> CustomScanResult<RwLockWriteGuard<'_, Option<ProviderMap>>> {
        self.entries
            .write()
            .map_err(|_| CustomScanError::internal("custom scan registry lock poisoned"))
    }
}

impl Default for ScanProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry
pub fn global_registry() -> &'static ScanProviderRegistry {
    &CUSTOM_SCAN_METHODS
}

/// Register a provider in the process-wide registry
pub fn register_custom_scan_methods(
    methods: &'static dyn ScanPlanMethods,
) -> CustomScanResult<()> {
    CUSTOM_SCAN_METHODS.register(methods)
}

/// Look up a provider in the process-wide registry
pub fn get_custom_scan_methods(
    name: &str,
    missing_ok: bool,
) -> CustomScanResult<Option<&'static dyn ScanPlanMethods>> {
    CUSTOM_SCAN_METHODS.lookup(name, missing_ok)
}
