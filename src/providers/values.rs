//! `values_scan`: scan over an inline list of rows
//!
//! Exposes every optional capability: mark/restore, backward scan,
//! parallel execution and EXPLAIN output.
//!
//! Shared region layout (parallel mode):
//!
//! ```text
//! +------------------+
//! | Next Row         | (u64 LE, claimed with fetch_add)
//! +------------------+
//! | Total Rows       | (u64 LE, written by the coordinator)
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::custom_scan::{
    Clause, CustomPath, CustomPathFlags, CustomScan, CustomScanResult, EState, ExecFlags,
    ExecMethods, ExecRole, ExplainCustomScan, ExplainState, MarkRestore, ParallelContext,
    ParallelScan, PathMethods, PlannerInfo, RelOptInfo, ScanDirection, ScanPlanMethods,
    SharedRegion, ShmToc, TargetEntry, Tuple,
};

use super::errors::{ProviderError, ProviderResult};

pub const VALUES_SCAN_NAME: &str = "values_scan";

const NEXT_ROW_OFFSET: usize = 0;
const TOTAL_ROWS_OFFSET: usize = 8;
const SHARED_SIZE: usize = 16;

/// Plan-private data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesPrivate {
    pub rows: Vec<Vec<Value>>,
}

impl ValuesPrivate {
    fn from_value(value: &Value) -> ProviderResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| ProviderError::InvalidPrivate(e.to_string()))
    }

    fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).min().unwrap_or(0)
    }
}

/// Path methods for `values_scan`
pub struct ValuesPathMethods;

/// Plan methods for `values_scan`
pub struct ValuesScanMethods;

pub static VALUES_PATH_METHODS: ValuesPathMethods = ValuesPathMethods;
pub static VALUES_SCAN_METHODS: ValuesScanMethods = ValuesScanMethods;

/// Candidate path scanning `rows`
pub fn values_path(rows: Vec<Vec<Value>>) -> CustomPath {
    let count = rows.len() as f64;
    CustomPath::new(
        &VALUES_PATH_METHODS,
        CustomPathFlags::SUPPORT_BACKWARD_SCAN | CustomPathFlags::SUPPORT_MARK_RESTORE,
    )
    .with_costs(count, 0.0, count * 0.01)
    .with_private(json!({ "rows": rows }))
}

fn fail(e: ProviderError) -> crate::custom_scan::CustomScanError {
    e.into_scan_error(VALUES_SCAN_NAME)
}

impl PathMethods for ValuesPathMethods {
    fn name(&self) -> &str {
        VALUES_SCAN_NAME
    }

    fn plan_custom_path(
        &self,
        _root: &mut PlannerInfo,
        rel: &RelOptInfo,
        best_path: &CustomPath,
        tlist: &[TargetEntry],
        clauses: &[Clause],
        custom_plans: Vec<CustomScan>,
    ) -> CustomScanResult<CustomScan> {
        if !custom_plans.is_empty() {
            return Err(fail(ProviderError::UnexpectedChildPlans(custom_plans.len())));
        }
        let private = ValuesPrivate::from_value(&best_path.custom_private).map_err(fail)?;
        check_columns(&private, tlist, clauses).map_err(fail)?;

        let mut plan = CustomScan::new(VALUES_SCAN_NAME, rel.relid);
        plan.flags = best_path.flags;
        plan.custom_exprs = clauses.to_vec();
        plan.custom_scan_tlist = tlist.to_vec();
        plan.custom_private = best_path.custom_private.clone();
        Ok(plan)
    }
}

fn check_columns(
    private: &ValuesPrivate,
    tlist: &[TargetEntry],
    clauses: &[Clause],
) -> ProviderResult<()> {
    if private.rows.is_empty() {
        return Ok(());
    }
    let width = private.width();
    let columns = tlist
        .iter()
        .map(|te| te.column)
        .chain(clauses.iter().map(|c| c.column));
    for column in columns {
        if column >= width {
            return Err(ProviderError::ColumnOutOfRange { column, width });
        }
    }
    Ok(())
}

impl ScanPlanMethods for ValuesScanMethods {
    fn name(&self) -> &str {
        VALUES_SCAN_NAME
    }

    fn create_custom_scan_state(
        &self,
        cscan: &CustomScan,
    ) -> CustomScanResult<Box<dyn ExecMethods>> {
        let private = ValuesPrivate::from_value(&cscan.custom_private).map_err(fail)?;
        check_columns(&private, &cscan.custom_scan_tlist, &cscan.custom_exprs).map_err(fail)?;

        Ok(Box::new(ValuesScanState {
            rows: private.rows.into_iter().map(Tuple::new).collect(),
            quals: cscan.custom_exprs.clone(),
            tlist: cscan.custom_scan_tlist.clone(),
            cursor: 0,
            marked: None,
            backward: false,
            role: ExecRole::Coordinator,
            shared: None,
            returned: 0,
        }))
    }
}

/// Execution state of `values_scan`
pub struct ValuesScanState {
    rows: Vec<Tuple>,
    quals: Vec<Clause>,
    tlist: Vec<TargetEntry>,
    /// Next position in scan order (local mode)
    cursor: usize,
    marked: Option<usize>,
    backward: bool,
    role: ExecRole,
    shared: Option<SharedRegion>,
    /// Tuples this instance has emitted since begin/rescan
    returned: u64,
}

impl ValuesScanState {
    /// Claim the next position in scan order
    fn next_position(&mut self) -> CustomScanResult<Option<usize>> {
        let len = self.rows.len();
        match &self.shared {
            Some(region) => {
                let claimed = region.fetch_add_u64(NEXT_ROW_OFFSET, 1)? as usize;
                Ok((claimed < len).then_some(claimed))
            }
            None => {
                if self.cursor >= len {
                    return Ok(None);
                }
                let position = self.cursor;
                self.cursor += 1;
                Ok(Some(position))
            }
        }
    }

    fn row_at(&self, position: usize) -> &Tuple {
        let index = if self.backward {
            self.rows.len() - 1 - position
        } else {
            position
        };
        &self.rows[index]
    }

    fn project(&self, row: &Tuple) -> Tuple {
        if self.tlist.is_empty() {
            return row.clone();
        }
        Tuple::new(
            self.tlist
                .iter()
                .map(|te| row.get(te.column).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

impl ExecMethods for ValuesScanState {
    fn begin(&mut self, estate: &EState, eflags: ExecFlags) -> CustomScanResult<()> {
        self.backward =
            estate.direction == ScanDirection::Backward || eflags.contains(ExecFlags::BACKWARD);
        self.role = estate.role;
        self.cursor = 0;
        self.returned = 0;
        Ok(())
    }

    fn exec(&mut self) -> CustomScanResult<Option<Tuple>> {
        while let Some(position) = self.next_position()? {
            let row = self.row_at(position);
            if self.quals.iter().all(|q| q.matches(row)) {
                let tuple = self.project(row);
                self.returned += 1;
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn end(&mut self) {
        self.rows.clear();
        self.marked = None;
        self.shared = None;
    }

    fn rescan(&mut self) -> CustomScanResult<()> {
        self.cursor = 0;
        self.marked = None;
        self.returned = 0;
        if let (Some(region), ExecRole::Coordinator) = (&self.shared, self.role) {
            region.write_u64(NEXT_ROW_OFFSET, 0)?;
        }
        Ok(())
    }

    fn mark_restore(&mut self) -> Option<&mut dyn MarkRestore> {
        Some(self)
    }

    fn parallel(&mut self) -> Option<&mut dyn ParallelScan> {
        Some(self)
    }

    fn explain(&self) -> Option<&dyn ExplainCustomScan> {
        Some(self)
    }
}

impl MarkRestore for ValuesScanState {
    fn mark_pos(&mut self) -> CustomScanResult<()> {
        if self.shared.is_some() {
            return Err(fail(ProviderError::MarkWhileParallel));
        }
        self.marked = Some(self.cursor);
        Ok(())
    }

    fn restore_pos(&mut self) -> CustomScanResult<()> {
        if self.shared.is_some() {
            return Err(fail(ProviderError::MarkWhileParallel));
        }
        self.cursor = self.marked.ok_or_else(|| fail(ProviderError::NoMark))?;
        Ok(())
    }
}

impl ParallelScan for ValuesScanState {
    fn estimate_dsm(&self, _pcxt: &ParallelContext) -> usize {
        SHARED_SIZE
    }

    fn initialize_dsm(
        &mut self,
        _pcxt: &ParallelContext,
        coordinate: &SharedRegion,
    ) -> CustomScanResult<()> {
        check_region(coordinate)?;
        coordinate.write_u64(NEXT_ROW_OFFSET, 0)?;
        coordinate.write_u64(TOTAL_ROWS_OFFSET, self.rows.len() as u64)?;
        self.shared = Some(coordinate.clone());
        Ok(())
    }

    fn initialize_worker(
        &mut self,
        _toc: &ShmToc,
        coordinate: &SharedRegion,
    ) -> CustomScanResult<()> {
        check_region(coordinate)?;
        let shared = coordinate.read_u64(TOTAL_ROWS_OFFSET)?;
        let local = self.rows.len() as u64;
        if shared != local {
            return Err(fail(ProviderError::SharedStateMismatch { shared, local }));
        }
        self.shared = Some(coordinate.clone());
        Ok(())
    }
}

fn check_region(region: &SharedRegion) -> CustomScanResult<()> {
    let have = region.len();
    if have < SHARED_SIZE {
        return Err(fail(ProviderError::SharedRegionTooSmall {
            need: SHARED_SIZE,
            have,
        }));
    }
    Ok(())
}

impl ExplainCustomScan for ValuesScanState {
    fn explain_custom_scan(
        &self,
        _ancestors: &[String],
        es: &mut ExplainState,
    ) -> CustomScanResult<()> {
        es.property_integer("Rows", self.rows.len() as i64);
        if !self.quals.is_empty() {
            es.property_list("Filter", self.quals.iter().map(|q| q.to_string()).collect());
        }
        es.property_text(
            "Direction",
            if self.backward { "Backward" } else { "Forward" },
        );
        es.property_text(
            "Parallel Aware",
            if self.shared.is_some() { "true" } else { "false" },
        );
        if es.verbose {
            if !self.tlist.is_empty() {
                es.property_list("Output", self.tlist.iter().map(|te| te.name.clone()).collect());
            }
            es.property_integer("Tuples Returned", self.returned as i64);
        }
        Ok(())
    }
}
