//! Observability events for aeroscan
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events in the custom scan subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Registry
    /// Provider registered under a new name
    ProviderRegistered,
    /// Registration rejected, name already taken
    ProviderDuplicate,
    /// Lookup for a name that was never registered
    ProviderUndefined,

    // Planning
    /// Path converted to a plan node
    PathPlanned,
    /// Plan node written to a handoff envelope
    PlanEncoded,
    /// Plan node read back from a handoff envelope
    PlanDecoded,
    /// Handoff envelope failed verification
    PlanCorrupted,

    // Scan lifecycle
    /// Execution state created from a plan node
    ScanCreate,
    /// Provider resources opened
    ScanBegin,
    /// Iteration reset to the start
    ScanRescan,
    /// Scan position saved
    ScanMark,
    /// Scan position restored
    ScanRestore,
    /// Provider resources released
    ScanEnd,
    /// Live execution state torn down without an explicit end
    ScanAborted,
    /// Caller attempted an illegal lifecycle transition
    ScanRejected,

    // Parallel
    /// Coordinator sized the shared region
    ParallelEstimate,
    /// Coordinator populated the shared region
    ParallelInitialize,
    /// Worker bound to the shared region
    ParallelWorkerAttach,
}

impl Event {
    /// Returns the event name as used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ProviderRegistered => "PROVIDER_REGISTERED",
            Event::ProviderDuplicate => "PROVIDER_DUPLICATE",
            Event::ProviderUndefined => "PROVIDER_UNDEFINED",
            Event::PathPlanned => "PATH_PLANNED",
            Event::PlanEncoded => "PLAN_ENCODED",
            Event::PlanDecoded => "PLAN_DECODED",
            Event::PlanCorrupted => "PLAN_CORRUPTED",
            Event::ScanCreate => "SCAN_CREATE",
            Event::ScanBegin => "SCAN_BEGIN",
            Event::ScanRescan => "SCAN_RESCAN",
            Event::ScanMark => "SCAN_MARK",
            Event::ScanRestore => "SCAN_RESTORE",
            Event::ScanEnd => "SCAN_END",
            Event::ScanAborted => "SCAN_ABORTED",
            Event::ScanRejected => "SCAN_REJECTED",
            Event::ParallelEstimate => "PARALLEL_ESTIMATE",
            Event::ParallelInitialize => "PARALLEL_INITIALIZE",
            Event::ParallelWorkerAttach => "PARALLEL_WORKER_ATTACH",
        }
    }

    /// Events that indicate a caller or configuration error
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Event::ProviderUndefined | Event::PlanCorrupted | Event::ScanRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
