//! Provider capability interfaces
//!
//! A custom scan provider implements three layers, one per engine phase:
//!
//! | Layer | Phase | Held by |
//! |---|---|---|
//! | [`PathMethods`] | planning | `CustomPath`, by reference |
//! | [`ScanPlanMethods`] | executor init | the registry, by name |
//! | [`ExecMethods`] | execution | `CustomScanState`, owned |
//!
//! `ExecMethods` has four required methods. The optional capability sets are
//! separate traits reached through accessor methods that default to `None`;
//! a provider opts in by overriding the accessor to return `Some(self)`.
//! The parallel triplet is a single trait, so a provider exposes all three
//! methods or none.

use super::errors::CustomScanResult;
use super::estate::{EState, ExecFlags, Tuple};
use super::explain::ExplainState;
use super::parallel::{ParallelContext, SharedRegion, ShmToc};
use super::path::{Clause, CustomPath, PlannerInfo, RelOptInfo, TargetEntry};
use super::plan::CustomScan;

/// Converts a chosen custom path into a plan node
pub trait PathMethods: Send + Sync {
    /// Provider name; must match the `ScanPlanMethods` registered for it
    fn name(&self) -> &str;

    /// Build the plan node for `best_path`.
    ///
    /// Must not touch planner state beyond building the returned node.
    /// The returned plan must carry `self.name()` as its `custom_name`.
    fn plan_custom_path(
        &self,
        root: &mut PlannerInfo,
        rel: &RelOptInfo,
        best_path: &CustomPath,
        tlist: &[TargetEntry],
        clauses: &[Clause],
        custom_plans: Vec<CustomScan>,
    ) -> CustomScanResult<CustomScan>;
}

/// Creates execution state from a plan node
///
/// This is the table recovered from the registry by name at executor init,
/// possibly in a different process from the one that planned the query.
pub trait ScanPlanMethods: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Materialize a fresh, not yet begun, execution state for `cscan`
    fn create_custom_scan_state(&self, cscan: &CustomScan)
        -> CustomScanResult<Box<dyn ExecMethods>>;
}

impl std::fmt::Debug for dyn ScanPlanMethods + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPlanMethods")
            .field("name", &self.name())
            .finish()
    }
}

/// Execution-state capabilities
///
/// Callers never invoke these directly; `CustomScanState` enforces the
/// lifecycle and gates the optional capabilities.
pub trait ExecMethods: Send {
    /// Open resources. Called at most once.
    fn begin(&mut self, estate: &EState, eflags: ExecFlags) -> CustomScanResult<()>;

    /// Next tuple, or `None` at end of data. Repeated calls after end of
    /// data keep returning `None`.
    fn exec(&mut self) -> CustomScanResult<Option<Tuple>>;

    /// Release resources. Must tolerate a failed or missing `begin`.
    fn end(&mut self);

    /// Reset iteration to the start
    fn rescan(&mut self) -> CustomScanResult<()>;

    /// Mark/restore capability, if supported
    fn mark_restore(&mut self) -> Option<&mut dyn MarkRestore> {
        None
    }

    /// Parallel capability, if supported
    fn parallel(&mut self) -> Option<&mut dyn ParallelScan> {
        None
    }

    /// EXPLAIN capability, if supported
    fn explain(&self) -> Option<&dyn ExplainCustomScan> {
        None
    }
}

/// Save and resume a scan position
pub trait MarkRestore {
    /// Remember the current position
    fn mark_pos(&mut self) -> CustomScanResult<()>;

    /// Return to the position saved by the most recent `mark_pos`
    fn restore_pos(&mut self) -> CustomScanResult<()>;
}

/// Shared-state parallel execution
pub trait ParallelScan {
    /// Bytes of shared region this node needs. Coordinator only, once.
    fn estimate_dsm(&self, pcxt: &ParallelContext) -> usize;

    /// Populate the freshly allocated region. Coordinator only, once,
    /// after `estimate_dsm`.
    fn initialize_dsm(
        &mut self,
        pcxt: &ParallelContext,
        coordinate: &SharedRegion,
    ) -> CustomScanResult<()>;

    /// Bind a worker's local state to the region. Once per worker, after
    /// the coordinator's `initialize_dsm`.
    fn initialize_worker(&mut self, toc: &ShmToc, coordinate: &SharedRegion)
        -> CustomScanResult<()>;
}

/// Extra EXPLAIN output
pub trait ExplainCustomScan {
    /// Add properties to `es`. Read-only with respect to the scan.
    fn explain_custom_scan(
        &self,
        ancestors: &[String],
        es: &mut ExplainState,
    ) -> CustomScanResult<()>;
}
