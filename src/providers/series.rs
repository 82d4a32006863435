//! `series_scan`: integer series generator
//!
//! Implements only the required callbacks; every optional capability is
//! left at its default.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::custom_scan::{
    Clause, CustomPath, CustomPathFlags, CustomScan, CustomScanError, CustomScanResult, EState,
    ExecFlags, ExecMethods, PathMethods, PlannerInfo, RelOptInfo, ScanPlanMethods, TargetEntry,
    Tuple,
};

use super::errors::ProviderError;

pub const SERIES_SCAN_NAME: &str = "series_scan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPrivate {
    pub start: i64,
    pub stop: i64,
    #[serde(default = "default_step")]
    pub step: i64,
}

fn default_step() -> i64 {
    1
}

impl SeriesPrivate {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let private: SeriesPrivate = serde_json::from_value(value.clone())
            .map_err(|e| ProviderError::InvalidPrivate(e.to_string()))?;
        if private.step == 0 {
            return Err(ProviderError::InvalidPrivate("step must be non-zero".into()));
        }
        Ok(private)
    }
}

pub struct SeriesPathMethods;
pub struct SeriesScanMethods;

pub static SERIES_PATH_METHODS: SeriesPathMethods = SeriesPathMethods;
pub static SERIES_SCAN_METHODS: SeriesScanMethods = SeriesScanMethods;

/// Candidate path producing `start..=stop` by `step`
pub fn series_path(start: i64, stop: i64, step: i64) -> CustomPath {
    let rows = if step == 0 {
        0.0
    } else {
        ((i128::from(stop) - i128::from(start)) / i128::from(step) + 1).max(0) as f64
    };
    CustomPath::new(&SERIES_PATH_METHODS, CustomPathFlags::NONE)
        .with_costs(rows, 0.0, rows * 0.01)
        .with_private(json!({ "start": start, "stop": stop, "step": step }))
}

fn fail(e: ProviderError) -> CustomScanError {
    e.into_scan_error(SERIES_SCAN_NAME)
}

impl PathMethods for SeriesPathMethods {
    fn name(&self) -> &str {
        SERIES_SCAN_NAME
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
        SeriesPrivate::from_value(&best_path.custom_private).map_err(fail)?;
        if let Some(column) = tlist
            .iter()
            .map(|te| te.column)
            .chain(clauses.iter().map(|c| c.column))
            .find(|column| *column > 0)
        {
            return Err(fail(ProviderError::ColumnOutOfRange { column, width: 1 }));
        }

        let mut plan = CustomScan::new(SERIES_SCAN_NAME, rel.relid);
        plan.flags = best_path.flags;
        plan.custom_exprs = clauses.to_vec();
        plan.custom_scan_tlist = tlist.to_vec();
        plan.custom_private = best_path.custom_private.clone();
        Ok(plan)
    }
}

impl ScanPlanMethods for SeriesScanMethods {
    fn name(&self) -> &str {
        SERIES_SCAN_NAME
    }

    fn create_custom_scan_state(
        &self,
        cscan: &CustomScan,
    ) -> CustomScanResult<Box<dyn ExecMethods>> {
        let private = SeriesPrivate::from_value(&cscan.custom_private).map_err(fail)?;
        Ok(Box::new(SeriesScanState {
            private,
            quals: cscan.custom_exprs.clone(),
            next: None,
        }))
    }
}

pub struct SeriesScanState {
    private: SeriesPrivate,
    quals: Vec<Clause>,
    next: Option<i64>,
}

impl SeriesScanState {
    fn in_range(&self, value: i64) -> bool {
        if self.private.step > 0 {
            value <= self.private.stop
        } else {
            value >= self.private.stop
        }
    }
}

impl ExecMethods for SeriesScanState {
    fn begin(&mut self, _estate: &EState, _eflags: ExecFlags) -> CustomScanResult<()> {
        self.next = Some(self.private.start);
        Ok(())
    }

    fn exec(&mut self) -> CustomScanResult<Option<Tuple>> {
        while let Some(value) = self.next {
            if !self.in_range(value) {
                self.next = None;
                break;
            }
            self.next = value.checked_add(self.private.step);
            let tuple = Tuple::new(vec![json!(value)]);
            if self.quals.iter().all(|q| q.matches(&tuple)) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn end(&mut self) {
        self.next = None;
    }

    fn rescan(&mut self) -> CustomScanResult<()> {
        self.next = Some(self.private.start);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_scan::ClauseOp;
    use crate::observability::MetricsRegistry;
    use std::sync::Arc;

    fn state(private: Value) -> Box<dyn ExecMethods> {
        let mut plan = CustomScan::new(SERIES_SCAN_NAME, 1);
        plan.custom_private = private;
        SERIES_SCAN_METHODS.create_custom_scan_state(&plan).unwrap()
    }

    fn drain(state: &mut Box<dyn ExecMethods>) -> Vec<i64> {
        let mut out = Vec::new();
        while let Some(t) = state.exec().unwrap() {
            out.push(t.values()[0].as_i64().unwrap());
        }
        out
    }

    #[test]
    fn test_generates_inclusive_series() {
        let mut s = state(json!({"start": 1, "stop": 4}));
        s.begin(&EState::new(Arc::new(MetricsRegistry::new())), ExecFlags::NONE)
            .unwrap();
        assert_eq!(drain(&mut s), vec![1, 2, 3, 4]);
        assert!(s.exec().unwrap().is_none());
    }

    #[test]
    fn test_negative_step_and_rescan() {
        let mut s = state(json!({"start": 3, "stop": 1, "step": -1}));
        s.begin(&EState::new(Arc::new(MetricsRegistry::new())), ExecFlags::NONE)
            .unwrap();
        assert_eq!(drain(&mut s), vec![3, 2, 1]);
        s.rescan().unwrap();
        assert_eq!(drain(&mut s), vec![3, 2, 1]);
    }

    #[test]
    fn test_quals_filter() {
        let mut plan = CustomScan::new(SERIES_SCAN_NAME, 1);
        plan.custom_private = json!({"start": 1, "stop": 10});
        plan.custom_exprs = vec![Clause::new(0, ClauseOp::Gt, json!(8))];
        let mut s = SERIES_SCAN_METHODS.create_custom_scan_state(&plan).unwrap();
        s.begin(&EState::new(Arc::new(MetricsRegistry::new())), ExecFlags::NONE)
            .unwrap();
        assert_eq!(drain(&mut s), vec![9, 10]);
    }

    #[test]
    fn test_no_optional_capabilities() {
        let mut s = state(json!({"start": 1, "stop": 2}));
        assert!(s.mark_restore().is_none());
        assert!(s.parallel().is_none());
        assert!(s.explain().is_none());
    }

    #[test]
    fn test_row_estimate_at_i64_extremes() {
        assert_eq!(series_path(1, i64::MIN, 1).rows, 0.0);
        assert_eq!(series_path(i64::MAX, i64::MIN, 1).rows, 0.0);
        assert_eq!(series_path(i64::MIN, i64::MAX, 1).rows, 2f64.powi(64));
        assert_eq!(series_path(i64::MIN, i64::MAX, i64::MIN).rows, 0.0);
    }

    #[test]
    fn test_series_ending_at_i64_max_terminates() {
        let mut s = state(json!({"start": i64::MAX - 1, "stop": i64::MAX}));
        s.begin(&EState::new(Arc::new(MetricsRegistry::new())), ExecFlags::NONE)
            .unwrap();
        assert_eq!(drain(&mut s), vec![i64::MAX - 1, i64::MAX]);
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut plan = CustomScan::new(SERIES_SCAN_NAME, 1);
        plan.custom_private = json!({"start": 1, "stop": 2, "step": 0});
        assert!(SERIES_SCAN_METHODS.create_custom_scan_state(&plan).is_err());
    }
}
