//! Scan metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for custom scan execution
///
/// Shared by every execution state of a query through `EState`.
/// Relaxed ordering: counters are observational only.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    scans_begun: AtomicU64,
    scans_ended: AtomicU64,
    scans_aborted: AtomicU64,
    tuples_returned: AtomicU64,
    rescans: AtomicU64,
    marks: AtomicU64,
    restores: AtomicU64,
    workers_attached: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_scans_begun(&self) {
        self.scans_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scans_ended(&self) {
        self.scans_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scans_aborted(&self) {
        self.scans_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tuples_returned(&self) {
        self.tuples_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rescans(&self) {
        self.rescans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_marks(&self) {
        self.marks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_restores(&self) {
        self.restores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_workers_attached(&self) {
        self.workers_attached.fetch_add(1, Ordering::Relaxed);
    }

    /// Tuples returned across all scans
    pub fn tuples_returned(&self) -> u64 {
        self.tuples_returned.load(Ordering::Relaxed)
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scans_begun: self.scans_begun.load(Ordering::Relaxed),
            scans_ended: self.scans_ended.load(Ordering::Relaxed),
            scans_aborted: self.scans_aborted.load(Ordering::Relaxed),
            tuples_returned: self.tuples_returned.load(Ordering::Relaxed),
            rescans: self.rescans.load(Ordering::Relaxed),
            marks: self.marks.load(Ordering::Relaxed),
            restores: self.restores.load(Ordering::Relaxed),
            workers_attached: self.workers_attached.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub scans_begun: u64,
    pub scans_ended: u64,
    pub scans_aborted: u64,
    pub tuples_returned: u64,
    pub rescans: u64,
    pub marks: u64,
    pub restores: u64,
    pub workers_attached: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.scans_begun, 0);
        assert_eq!(snapshot.tuples_returned, 0);
        assert_eq!(snapshot.workers_attached, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_scans_begun();
        registry.increment_tuples_returned();
        registry.increment_tuples_returned();
        registry.increment_rescans();
        registry.increment_marks();
        registry.increment_restores();
        registry.increment_scans_ended();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.scans_begun, 1);
        assert_eq!(snapshot.tuples_returned, 2);
        assert_eq!(snapshot.rescans, 1);
        assert_eq!(snapshot.marks, 1);
        assert_eq!(snapshot.restores, 1);
        assert_eq!(snapshot.scans_ended, 1);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.increment_workers_attached();

        let json: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(json["workers_attached"], 1);
        assert_eq!(json["scans_aborted"], 0);
    }
}
