//! Engine-side custom scan execution node
//!
//! `CustomScanState` owns a provider's execution state and is the only
//! caller of its `ExecMethods`. It enforces the lifecycle state machine,
//! gates the optional capabilities, and guarantees exactly one `end()`
//! per instance (explicit, or on drop during executor teardown).

use std::sync::Arc;

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::errors::{CustomScanError, CustomScanResult};
use super::estate::{EState, ExecFlags, ExecRole, ScanDirection, Tuple};
use super::explain::ExplainState;
use super::methods::ExecMethods;
use super::parallel::{ParallelContext, SharedRegion, ShmToc};
use super::path::CustomPathFlags;
use super::plan::CustomScan;
use super::registry::{global_registry, ScanProviderRegistry};
use super::state::{ForbiddenTransition, ScanLifecycle};

/// Execution node for one custom scan plan node
pub struct CustomScanState {
    plan_node_id: u32,
    provider: String,
    flags: CustomPathFlags,
    methods: Box<dyn ExecMethods>,
    state: ScanLifecycle,
    eflags: ExecFlags,
    role: ExecRole,
    /// End of data reached since the last begin/rescan/restore
    at_end: bool,
    supports_mark_restore: bool,
    supports_parallel: bool,
    supports_explain: bool,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl CustomScanState {
    /// Create the node for `plan`, resolving its provider in the
    /// process-wide registry
    pub fn create(plan: &CustomScan) -> CustomScanResult<Self> {
        Self::create_with_registry(global_registry(), plan)
    }

    /// Create the node for `plan`, resolving its provider in `registry`
    pub fn create_with_registry(
        registry: &ScanProviderRegistry,
        plan: &CustomScan,
    ) -> CustomScanResult<Self> {
        plan.validate()?;
        let scan_methods = registry
            .lookup(&plan.custom_name, false)?
            .ok_or_else(|| CustomScanError::undefined_object(&plan.custom_name))?;

        let mut methods = scan_methods.create_custom_scan_state(plan)?;
        let supports_mark_restore = methods.mark_restore().is_some();
        let supports_parallel = methods.parallel().is_some();
        let supports_explain = methods.explain().is_some();

        log_event_with_fields(
            Event::ScanCreate,
            &[
                ("provider", &plan.custom_name),
                ("plan_node_id", &plan.plan_node_id.to_string()),
            ],
        );

        Ok(Self {
            plan_node_id: plan.plan_node_id,
            provider: plan.custom_name.clone(),
            flags: plan.flags,
            methods,
            state: ScanLifecycle::Uninitialized,
            eflags: ExecFlags::NONE,
            role: ExecRole::Coordinator,
            at_end: false,
            supports_mark_restore,
            supports_parallel,
            supports_explain,
            metrics: None,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn plan_node_id(&self) -> u32 {
        self.plan_node_id
    }

    pub fn state(&self) -> ScanLifecycle {
        self.state
    }

    pub fn role(&self) -> ExecRole {
        self.role
    }

    /// Mark/restore is usable only when the plan declared it and the
    /// execution state exposes it
    pub fn supports_mark_restore(&self) -> bool {
        self.supports_mark_restore && self.flags.contains(CustomPathFlags::SUPPORT_MARK_RESTORE)
    }

    pub fn supports_backward_scan(&self) -> bool {
        self.flags.contains(CustomPathFlags::SUPPORT_BACKWARD_SCAN)
    }

    pub fn supports_parallel(&self) -> bool {
        self.supports_parallel
    }

    pub fn supports_explain(&self) -> bool {
        self.supports_explain
    }

    /// Open the provider's resources.
    ///
    /// Rejects `MARK` and `BACKWARD` requests the node cannot honour before
    /// the provider is touched. If the provider's `begin` fails the node
    /// stays UNINITIALIZED; `end()` remains legal.
    pub fn begin(&mut self, estate: &EState, eflags: ExecFlags) -> CustomScanResult<()> {
        self.transition(self.state.begin())?;

        if eflags.contains(ExecFlags::MARK) && !self.supports_mark_restore() {
            return Err(CustomScanError::unsupported(&self.provider, "mark/restore"));
        }
        let backward =
            eflags.contains(ExecFlags::BACKWARD) || estate.direction == ScanDirection::Backward;
        if backward && !self.supports_backward_scan() {
            return Err(CustomScanError::unsupported(&self.provider, "backward scan"));
        }

        self.methods.begin(estate, eflags)?;

        self.state = ScanLifecycle::Begun;
        self.eflags = eflags;
        self.role = estate.role;
        self.at_end = false;
        estate.metrics.increment_scans_begun();
        self.metrics = Some(Arc::clone(&estate.metrics));
        self.log(Event::ScanBegin);
        Ok(())
    }

    /// Next tuple, or `None` at end of data
    pub fn exec(&mut self) -> CustomScanResult<Option<Tuple>> {
        let next = self.transition(self.state.exec())?;
        if self.eflags.contains(ExecFlags::EXPLAIN_ONLY) {
            return Err(CustomScanError::forbidden_transition(
                &self.provider,
                "EXPLAIN-only",
                "exec",
            ));
        }
        if self.at_end {
            self.state = next;
            return Ok(None);
        }

        let tuple = self.methods.exec()?;
        self.state = next;
        match &tuple {
            Some(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_tuples_returned();
                }
            }
            None => self.at_end = true,
        }
        Ok(tuple)
    }

    /// Reset iteration to the start
    pub fn rescan(&mut self) -> CustomScanResult<()> {
        let next = self.transition(self.state.rescan())?;
        self.methods.rescan()?;
        self.state = next;
        self.at_end = false;
        if let Some(metrics) = &self.metrics {
            metrics.increment_rescans();
        }
        self.log(Event::ScanRescan);
        Ok(())
    }

    /// Save the current position
    pub fn mark_pos(&mut self) -> CustomScanResult<()> {
        if !self.supports_mark_restore() {
            return Err(CustomScanError::unsupported(&self.provider, "mark/restore"));
        }
        let next = self.transition(self.state.mark())?;
        let provider = &self.provider;
        self.methods
            .mark_restore()
            .ok_or_else(|| CustomScanError::unsupported(provider, "mark/restore"))?
            .mark_pos()?;
        self.state = next;
        if let Some(metrics) = &self.metrics {
            metrics.increment_marks();
        }
        self.log(Event::ScanMark);
        Ok(())
    }

    /// Return to the most recently marked position
    pub fn restore_pos(&mut self) -> CustomScanResult<()> {
        if !self.supports_mark_restore() {
            return Err(CustomScanError::unsupported(&self.provider, "mark/restore"));
        }
        let next = self.transition(self.state.restore())?;
        let provider = &self.provider;
        self.methods
            .mark_restore()
            .ok_or_else(|| CustomScanError::unsupported(provider, "mark/restore"))?
            .restore_pos()?;
        self.state = next;
        self.at_end = false;
        if let Some(metrics) = &self.metrics {
            metrics.increment_restores();
        }
        self.log(Event::ScanRestore);
        Ok(())
    }

    /// Release the provider's resources. Legal from any state but ENDED.
    pub fn end(&mut self) -> CustomScanResult<()> {
        self.transition(self.state.end())?;
        self.methods.end();
        self.state = ScanLifecycle::Ended;
        if let Some(metrics) = &self.metrics {
            metrics.increment_scans_ended();
        }
        self.log(Event::ScanEnd);
        Ok(())
    }

    /// Add this node's EXPLAIN properties to `es`
    pub fn explain(&self, ancestors: &[String], es: &mut ExplainState) -> CustomScanResult<()> {
        self.state
            .check_explain()
            .map_err(|e| self.rejected(e))?;

        es.property_text("Custom Scan Provider", self.provider.clone());
        if let Some(explain) = self.methods.explain() {
            explain.explain_custom_scan(ancestors, es)?;
        }
        Ok(())
    }

    pub(super) fn estimate_dsm(&mut self, pcxt: &ParallelContext) -> CustomScanResult<usize> {
        self.check_parallel_step("estimate_dsm", false)?;
        let provider = &self.provider;
        let size = self
            .methods
            .parallel()
            .ok_or_else(|| CustomScanError::unsupported(provider, "parallel execution"))?
            .estimate_dsm(pcxt);
        Ok(size)
    }

    pub(super) fn initialize_dsm(
        &mut self,
        pcxt: &ParallelContext,
        region: &SharedRegion,
    ) -> CustomScanResult<()> {
        self.check_parallel_step("initialize_dsm", false)?;
        let provider = &self.provider;
        self.methods
            .parallel()
            .ok_or_else(|| CustomScanError::unsupported(provider, "parallel execution"))?
            .initialize_dsm(pcxt, region)
    }

    pub(super) fn initialize_worker(
        &mut self,
        toc: &ShmToc,
        region: &SharedRegion,
    ) -> CustomScanResult<()> {
        self.check_parallel_step("initialize_worker", true)?;
        let provider = &self.provider;
        self.methods
            .parallel()
            .ok_or_else(|| CustomScanError::unsupported(provider, "parallel execution"))?
            .initialize_worker(toc, region)?;
        if let Some(metrics) = &self.metrics {
            metrics.increment_workers_attached();
        }
        Ok(())
    }

    fn check_parallel_step(&self, operation: &'static str, worker_step: bool) -> CustomScanResult<()> {
        if !self.supports_parallel {
            return Err(CustomScanError::unsupported(&self.provider, "parallel execution"));
        }
        self.state
            .check_parallel_setup(operation)
            .map_err(|e| self.rejected(e))?;

        let is_worker = matches!(self.role, ExecRole::Worker(_));
        if worker_step != is_worker {
            return Err(CustomScanError::parallel_protocol(format!(
                "{} called from {} on provider \"{}\"",
                operation,
                if is_worker { "a worker" } else { "the coordinator" },
                self.provider
            )));
        }
        Ok(())
    }

    fn transition(
        &self,
        result: Result<ScanLifecycle, ForbiddenTransition>,
    ) -> CustomScanResult<ScanLifecycle> {
        result.map_err(|e| self.rejected(e))
    }

    fn rejected(&self, e: ForbiddenTransition) -> CustomScanError {
        log_event_with_fields(
            Event::ScanRejected,
            &[
                ("provider", &self.provider),
                ("state", e.from.state_name()),
                ("operation", e.operation),
            ],
        );
        CustomScanError::forbidden_transition(&self.provider, e.from.state_name(), e.operation)
    }

    fn log(&self, event: Event) {
        log_event_with_fields(
            event,
            &[
                ("provider", &self.provider),
                ("plan_node_id", &self.plan_node_id.to_string()),
                ("state", self.state.state_name()),
            ],
        );
    }
}

impl Drop for CustomScanState {
    fn drop(&mut self) {
        if self.state.is_ended() {
            return;
        }
        self.methods.end();
        self.state = ScanLifecycle::Ended;
        if let Some(metrics) = &self.metrics {
            metrics.increment_scans_aborted();
        }
        self.log(Event::ScanAborted);
    }
}

impl std::fmt::Debug for CustomScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomScanState")
            .field("plan_node_id", &self.plan_node_id)
            .field("provider", &self.provider)
            .field("state", &self.state)
            .field("role", &self.role)
            .finish()
    }
}

/// Create and begin the execution node for `plan`
pub fn exec_init_custom_scan(
    plan: &CustomScan,
    estate: &EState,
    eflags: ExecFlags,
) -> CustomScanResult<CustomScanState> {
    let mut node = CustomScanState::create(plan)?;
    node.begin(estate, eflags)?;
    Ok(node)
}
