//! Custom scan extensibility
//!
//! Lets external providers plug alternative scan and join strategies into
//! the planner and executor without touching either.
//!
//! # Components
//!
//! - Provider registry: process-wide name → `ScanPlanMethods` store
//! - Scan lifecycle contract: `PathMethods` → `ScanPlanMethods` →
//!   `ExecMethods`, driven by `CustomScanState`
//!
//! # Flow
//!
//! 1. Startup: each provider registers its `ScanPlanMethods` by name
//! 2. Planning: a `CustomPath` carries `PathMethods` by reference;
//!    `create_custom_scan_plan` turns it into a `CustomScan` plan node
//! 3. Handoff: the plan node carries only the provider *name*; it may be
//!    encoded, shipped to another process and decoded
//! 4. Executor init: the name is looked up in the registry and the
//!    provider materializes its execution state
//! 5. Execution: `CustomScanState` drives the execution state through
//!    UNINITIALIZED → BEGUN → RUNNING/MARKED → ENDED
//!
//! # Errors
//!
//! The registry raises exactly two conditions: duplicate registration and
//! undefined provider. Everything else here is contract enforcement.

mod errors;
mod estate;
mod explain;
mod methods;
mod node;
mod parallel;
mod path;
mod plan;
mod registry;
mod state;

pub use errors::{CustomScanError, CustomScanErrorCode, CustomScanResult, Severity};
pub use estate::{EState, ExecFlags, ExecRole, ScanDirection, Tuple};
pub use explain::{ExplainFormat, ExplainState};
pub use methods::{
    ExecMethods, ExplainCustomScan, MarkRestore, ParallelScan, PathMethods, ScanPlanMethods,
};
pub use node::{exec_init_custom_scan, CustomScanState};
pub use parallel::{ParallelContext, ParallelScanCoordinator, SharedRegion, ShmToc};
pub use path::{
    Clause, ClauseOp, CustomPath, CustomPathFlags, PlannerInfo, RelOptInfo, TargetEntry,
};
pub use plan::{create_custom_scan_plan, CustomScan};
pub use registry::{
    get_custom_scan_methods, global_registry, register_custom_scan_methods, ScanProviderRegistry,
    CUSTOM_NAME_MAX_LEN,
};
pub use state::{ForbiddenTransition, ScanLifecycle};
