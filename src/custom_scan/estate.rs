//! Executor-side boundary types
//!
//! The tuple pipeline and expression evaluation live outside this crate;
//! custom scans only see the per-query executor state, the init flags and
//! the tuples they produce.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::observability::MetricsRegistry;

/// Direction the executor pulls tuples in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    Forward,
    Backward,
}

/// Where this execution state runs in a parallel query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecRole {
    /// Leader / only process; may drive the coordinator side of parallel setup
    #[default]
    Coordinator,
    /// Parallel worker with the given number
    Worker(usize),
}

/// Per-query executor state
#[derive(Debug, Clone)]
pub struct EState {
    pub query_id: Uuid,
    pub direction: ScanDirection,
    pub role: ExecRole,
    pub metrics: Arc<MetricsRegistry>,
}

impl EState {
    /// Executor state for a coordinator
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            direction: ScanDirection::Forward,
            role: ExecRole::Coordinator,
            metrics,
        }
    }

    /// Executor state for a parallel worker of the same query
    pub fn for_worker(&self, worker_number: usize) -> Self {
        Self {
            query_id: self.query_id,
            direction: self.direction,
            role: ExecRole::Worker(worker_number),
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn with_direction(mut self, direction: ScanDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn is_worker(&self) -> bool {
        matches!(self.role, ExecRole::Worker(_))
    }
}

/// Flags passed to `begin`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExecFlags(u32);

impl ExecFlags {
    pub const NONE: ExecFlags = ExecFlags(0);
    /// Only initializing for EXPLAIN; no tuples will be pulled
    pub const EXPLAIN_ONLY: ExecFlags = ExecFlags(0x0001);
    /// Caller expects rescans
    pub const REWIND: ExecFlags = ExecFlags(0x0002);
    /// Caller may pull backward
    pub const BACKWARD: ExecFlags = ExecFlags(0x0004);
    /// Caller will use mark/restore
    pub const MARK: ExecFlags = ExecFlags(0x0008);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: ExecFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ExecFlags {
    type Output = ExecFlags;

    fn bitor(self, rhs: ExecFlags) -> ExecFlags {
        ExecFlags(self.0 | rhs.0)
    }
}

/// A produced row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
