//! Scan Lifecycle Contract Tests
//!
//! Drives `CustomScanState` against a call-counting provider and checks:
//! - ordering: begin before exec, nothing after end
//! - end runs exactly once per instance, explicitly or on drop
//! - optional capabilities are gated before the provider is touched
//! - exec flags the plan cannot honour are rejected at begin

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aeroscan::custom_scan::{
    register_custom_scan_methods, CustomPathFlags, CustomScan, CustomScanError,
    CustomScanErrorCode, CustomScanResult, CustomScanState, EState, ExecFlags, ExecMethods,
    ExplainCustomScan, ExplainState, MarkRestore, ScanDirection, ScanLifecycle, ScanPlanMethods,
    Tuple,
};
use aeroscan::observability::MetricsRegistry;
use serde_json::json;

// =============================================================================
// Test Utilities
// =============================================================================

#[derive(Default)]
struct Calls {
    begin: AtomicUsize,
    exec: AtomicUsize,
    end: AtomicUsize,
    rescan: AtomicUsize,
    mark: AtomicUsize,
    restore: AtomicUsize,
    explain: AtomicUsize,
}

impl Calls {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct CountingScan {
    name: String,
    calls: Arc<Calls>,
    rows: i64,
    capable: bool,
    fail_begin: bool,
}

impl ScanPlanMethods for CountingScan {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_custom_scan_state(
        &self,
        _cscan: &CustomScan,
    ) -> CustomScanResult<Box<dyn ExecMethods>> {
        Ok(Box::new(CountingState {
            name: self.name.clone(),
            calls: Arc::clone(&self.calls),
            rows: self.rows,
            capable: self.capable,
            fail_begin: self.fail_begin,
            next: 0,
            marked: 0,
        }))
    }
}

struct CountingState {
    name: String,
    calls: Arc<Calls>,
    rows: i64,
    capable: bool,
    fail_begin: bool,
    next: i64,
    marked: i64,
}

impl ExecMethods for CountingState {
    fn begin(&mut self, _estate: &EState, _eflags: ExecFlags) -> CustomScanResult<()> {
        self.calls.begin.fetch_add(1, Ordering::SeqCst);
        if self.fail_begin {
            return Err(CustomScanError::scan_failed(&self.name, "cannot open source"));
        }
        Ok(())
    }

    fn exec(&mut self) -> CustomScanResult<Option<Tuple>> {
        self.calls.exec.fetch_add(1, Ordering::SeqCst);
        if self.next >= self.rows {
            return Ok(None);
        }
        self.next += 1;
        Ok(Some(Tuple::new(vec![json!(self.next)])))
    }

    fn end(&mut self) {
        self.calls.end.fetch_add(1, Ordering::SeqCst);
    }

    fn rescan(&mut self) -> CustomScanResult<()> {
        self.calls.rescan.fetch_add(1, Ordering::SeqCst);
        self.next = 0;
        Ok(())
    }

    fn mark_restore(&mut self) -> Option<&mut dyn MarkRestore> {
        if self.capable {
            Some(self)
        } else {
            None
        }
    }

    fn explain(&self) -> Option<&dyn ExplainCustomScan> {
        if self.capable {
            Some(self)
        } else {
            None
        }
    }
}

impl MarkRestore for CountingState {
    fn mark_pos(&mut self) -> CustomScanResult<()> {
        self.calls.mark.fetch_add(1, Ordering::SeqCst);
        self.marked = self.next;
        Ok(())
    }

    fn restore_pos(&mut self) -> CustomScanResult<()> {
        self.calls.restore.fetch_add(1, Ordering::SeqCst);
        self.next = self.marked;
        Ok(())
    }
}

impl ExplainCustomScan for CountingState {
    fn explain_custom_scan(
        &self,
        _ancestors: &[String],
        es: &mut ExplainState,
    ) -> CustomScanResult<()> {
        self.calls.explain.fetch_add(1, Ordering::SeqCst);
        es.property_integer("Next", self.next);
        Ok(())
    }
}

struct Fixture {
    calls: Arc<Calls>,
    plan: CustomScan,
}

/// Register a fresh provider under a unique name
fn provider(name: &str, rows: i64, capable: bool, fail_begin: bool) -> Fixture {
    let calls = Arc::new(Calls::default());
    let methods: &'static CountingScan = Box::leak(Box::new(CountingScan {
        name: name.to_string(),
        calls: Arc::clone(&calls),
        rows,
        capable,
        fail_begin,
    }));
    register_custom_scan_methods(methods).unwrap();

    let mut plan = CustomScan::new(name, 1);
    if capable {
        plan.flags = CustomPathFlags::SUPPORT_MARK_RESTORE;
    }
    Fixture { calls, plan }
}

fn estate() -> (EState, Arc<MetricsRegistry>) {
    let metrics = Arc::new(MetricsRegistry::new());
    (EState::new(Arc::clone(&metrics)), metrics)
}

fn assert_code(result: CustomScanResult<impl std::fmt::Debug>, code: CustomScanErrorCode) {
    match result {
        Ok(v) => panic!("expected {:?}, got Ok({:?})", code, v),
        Err(e) => assert_eq!(e.code(), code, "unexpected error: {}", e),
    }
}

fn values(node: &mut CustomScanState) -> Vec<i64> {
    let mut out = Vec::new();
    while let Some(t) = node.exec().unwrap() {
        out.push(t.values()[0].as_i64().unwrap());
    }
    out
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_exec_before_begin_is_rejected_without_calling_provider() {
    let f = provider("lifecycle_exec_before_begin", 3, false, false);
    let mut node = CustomScanState::create(&f.plan).unwrap();

    assert_code(node.exec(), CustomScanErrorCode::AeroScanLifecycle);
    assert_eq!(Calls::get(&f.calls.exec), 0);
    assert_eq!(node.state(), ScanLifecycle::Uninitialized);
}

#[test]
fn test_begin_exec_end_sequence() {
    let f = provider("lifecycle_full_sequence", 3, false, false);
    let (estate, metrics) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();

    node.begin(&estate, ExecFlags::NONE).unwrap();
    assert_eq!(node.state(), ScanLifecycle::Begun);
    assert_eq!(values(&mut node), vec![1, 2, 3]);
    assert_eq!(node.state(), ScanLifecycle::Running);
    node.end().unwrap();

    assert_eq!(Calls::get(&f.calls.begin), 1);
    assert_eq!(Calls::get(&f.calls.end), 1);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.scans_begun, 1);
    assert_eq!(snapshot.scans_ended, 1);
    assert_eq!(snapshot.tuples_returned, 3);
}

#[test]
fn test_end_of_data_is_repeatable() {
    let f = provider("lifecycle_repeat_end_of_data", 1, false, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::NONE).unwrap();

    assert!(node.exec().unwrap().is_some());
    assert!(node.exec().unwrap().is_none());
    assert!(node.exec().unwrap().is_none());
    assert!(node.exec().unwrap().is_none());
    // Provider is not asked again once it has reported end of data.
    assert_eq!(Calls::get(&f.calls.exec), 2);
}

#[test]
fn test_nothing_is_legal_after_end() {
    let f = provider("lifecycle_after_end", 2, true, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::NONE).unwrap();
    node.end().unwrap();

    assert_code(node.exec(), CustomScanErrorCode::AeroScanLifecycle);
    assert_code(node.rescan(), CustomScanErrorCode::AeroScanLifecycle);
    assert_code(node.mark_pos(), CustomScanErrorCode::AeroScanLifecycle);
    assert_code(node.end(), CustomScanErrorCode::AeroScanLifecycle);
    assert_code(
        node.explain(&[], &mut ExplainState::default()),
        CustomScanErrorCode::AeroScanLifecycle,
    );
    assert_code(
        node.begin(&estate, ExecFlags::NONE),
        CustomScanErrorCode::AeroScanLifecycle,
    );
    assert_eq!(Calls::get(&f.calls.end), 1);
    assert_eq!(Calls::get(&f.calls.begin), 1);
}

#[test]
fn test_rescan_restarts_iteration() {
    let f = provider("lifecycle_rescan", 2, false, false);
    let (estate, metrics) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::NONE).unwrap();

    assert_eq!(values(&mut node), vec![1, 2]);
    node.rescan().unwrap();
    assert_eq!(node.state(), ScanLifecycle::Begun);
    assert_eq!(values(&mut node), vec![1, 2]);
    assert_eq!(Calls::get(&f.calls.rescan), 1);
    assert_eq!(metrics.snapshot().rescans, 1);
}

// =============================================================================
// Teardown
// =============================================================================

#[test]
fn test_drop_without_end_ends_exactly_once() {
    let f = provider("lifecycle_abort_on_drop", 5, false, false);
    let (estate, metrics) = estate();
    {
        let mut node = CustomScanState::create(&f.plan).unwrap();
        node.begin(&estate, ExecFlags::NONE).unwrap();
        node.exec().unwrap();
    }
    assert_eq!(Calls::get(&f.calls.end), 1);
    assert_eq!(metrics.snapshot().scans_aborted, 1);
    assert_eq!(metrics.snapshot().scans_ended, 0);
}

#[test]
fn test_drop_after_end_does_not_end_again() {
    let f = provider("lifecycle_drop_after_end", 1, false, false);
    let (estate, metrics) = estate();
    {
        let mut node = CustomScanState::create(&f.plan).unwrap();
        node.begin(&estate, ExecFlags::NONE).unwrap();
        node.end().unwrap();
    }
    assert_eq!(Calls::get(&f.calls.end), 1);
    assert_eq!(metrics.snapshot().scans_aborted, 0);
}

#[test]
fn test_failed_begin_leaves_node_uninitialized() {
    let f = provider("lifecycle_failed_begin", 1, false, true);
    let (estate, metrics) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();

    assert_code(
        node.begin(&estate, ExecFlags::NONE),
        CustomScanErrorCode::AeroScanFailed,
    );
    assert_eq!(node.state(), ScanLifecycle::Uninitialized);
    assert_code(node.exec(), CustomScanErrorCode::AeroScanLifecycle);

    // End stays legal and releases whatever begin opened.
    node.end().unwrap();
    assert_eq!(Calls::get(&f.calls.end), 1);
    assert_eq!(metrics.snapshot().scans_begun, 0);
}

// =============================================================================
// Optional capability gating
// =============================================================================

#[test]
fn test_mark_restore_unsupported_never_reaches_provider() {
    let f = provider("lifecycle_no_mark_restore", 3, false, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::NONE).unwrap();
    node.exec().unwrap();

    assert!(!node.supports_mark_restore());
    assert_code(node.mark_pos(), CustomScanErrorCode::AeroScanUnsupported);
    assert_code(node.restore_pos(), CustomScanErrorCode::AeroScanUnsupported);
    assert_eq!(Calls::get(&f.calls.mark), 0);
    assert_eq!(Calls::get(&f.calls.restore), 0);
    assert_eq!(node.state(), ScanLifecycle::Running);
}

#[test]
fn test_mark_flag_rejected_at_begin_when_unsupported() {
    let f = provider("lifecycle_mark_flag_rejected", 3, false, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();

    assert_code(
        node.begin(&estate, ExecFlags::MARK),
        CustomScanErrorCode::AeroScanUnsupported,
    );
    assert_eq!(Calls::get(&f.calls.begin), 0);
}

#[test]
fn test_mark_restore_requires_plan_flag() {
    let mut f = provider("lifecycle_mark_needs_flag", 3, true, false);
    f.plan.flags = CustomPathFlags::NONE;
    let node = CustomScanState::create(&f.plan).unwrap();
    assert!(!node.supports_mark_restore());
}

#[test]
fn test_backward_rejected_without_flag() {
    let f = provider("lifecycle_backward_rejected", 3, false, false);
    let (estate, _) = estate();
    let backward = estate.clone().with_direction(ScanDirection::Backward);

    let mut node = CustomScanState::create(&f.plan).unwrap();
    assert_code(
        node.begin(&backward, ExecFlags::NONE),
        CustomScanErrorCode::AeroScanUnsupported,
    );
    assert_code(
        node.begin(&estate, ExecFlags::BACKWARD),
        CustomScanErrorCode::AeroScanUnsupported,
    );
    assert_eq!(Calls::get(&f.calls.begin), 0);
}

#[test]
fn test_mark_and_restore() {
    let f = provider("lifecycle_mark_restore", 4, true, false);
    let (estate, metrics) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::MARK).unwrap();

    // Mark needs a current position.
    assert_code(node.mark_pos(), CustomScanErrorCode::AeroScanLifecycle);

    node.exec().unwrap();
    node.mark_pos().unwrap();
    assert_eq!(node.state(), ScanLifecycle::Marked);

    // Executing keeps the mark.
    node.exec().unwrap();
    node.exec().unwrap();
    assert_eq!(node.state(), ScanLifecycle::Marked);

    node.restore_pos().unwrap();
    assert_eq!(node.state(), ScanLifecycle::Running);
    assert_eq!(values(&mut node), vec![2, 3, 4]);

    // Restore consumed the mark.
    assert_code(node.restore_pos(), CustomScanErrorCode::AeroScanLifecycle);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.marks, 1);
    assert_eq!(snapshot.restores, 1);
}

#[test]
fn test_restore_after_end_of_data_resumes() {
    let f = provider("lifecycle_restore_after_eod", 2, true, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::MARK).unwrap();

    node.exec().unwrap();
    node.mark_pos().unwrap();
    assert_eq!(values(&mut node), vec![2]);
    node.restore_pos().unwrap();
    assert_eq!(values(&mut node), vec![2]);
}

#[test]
fn test_rescan_discards_mark() {
    let f = provider("lifecycle_rescan_discards_mark", 3, true, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::NONE).unwrap();
    node.exec().unwrap();
    node.mark_pos().unwrap();

    node.rescan().unwrap();
    assert_eq!(node.state(), ScanLifecycle::Begun);
    assert_code(node.restore_pos(), CustomScanErrorCode::AeroScanLifecycle);
}

// =============================================================================
// EXPLAIN
// =============================================================================

#[test]
fn test_explain_only_forbids_exec() {
    let f = provider("lifecycle_explain_only", 3, true, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::EXPLAIN_ONLY).unwrap();

    let mut es = ExplainState::default();
    node.explain(&[], &mut es).unwrap();
    assert_eq!(es.get("Custom Scan Provider"), Some(&json!("lifecycle_explain_only")));
    assert_eq!(es.get("Next"), Some(&json!(0)));
    assert_eq!(Calls::get(&f.calls.explain), 1);

    assert_code(node.exec(), CustomScanErrorCode::AeroScanLifecycle);
    assert_eq!(Calls::get(&f.calls.exec), 0);
    node.end().unwrap();
}

#[test]
fn test_explain_before_begin_rejected() {
    let f = provider("lifecycle_explain_before_begin", 3, true, false);
    let node = CustomScanState::create(&f.plan).unwrap();
    assert_code(
        node.explain(&[], &mut ExplainState::default()),
        CustomScanErrorCode::AeroScanLifecycle,
    );
    assert_eq!(Calls::get(&f.calls.explain), 0);
}

#[test]
fn test_explain_without_provider_hook_uses_default_output() {
    let f = provider("lifecycle_explain_default", 3, false, false);
    let (estate, _) = estate();
    let mut node = CustomScanState::create(&f.plan).unwrap();
    node.begin(&estate, ExecFlags::NONE).unwrap();

    let mut es = ExplainState::default();
    node.explain(&[], &mut es).unwrap();
    assert_eq!(es.properties().len(), 1);
    assert_eq!(es.render(), "  Custom Scan Provider: lifecycle_explain_default\n");
}

#[test]
fn test_create_with_unregistered_name() {
    let plan = CustomScan::new("lifecycle_never_registered", 1);
    let err = CustomScanState::create(&plan).unwrap_err();
    assert_eq!(err.code(), CustomScanErrorCode::AeroUndefinedObject);
}
