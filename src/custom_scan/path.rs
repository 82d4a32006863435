//! Planner-side boundary types
//!
//! The cost-based planner lives outside this crate. These are the pieces of
//! its state a custom path sees: the planner context, the relation being
//! scanned, the requested target list and the restriction clauses.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::estate::Tuple;
use super::methods::PathMethods;

/// Planner context for one query
#[derive(Debug, Clone)]
pub struct PlannerInfo {
    /// Query being planned
    pub query_id: Uuid,
    next_plan_node_id: u32,
}

impl PlannerInfo {
    /// Create a planner context for a new query
    pub fn new() -> Self {
        Self::for_query(Uuid::new_v4())
    }

    /// Create a planner context for a known query id
    pub fn for_query(query_id: Uuid) -> Self {
        Self {
            query_id,
            next_plan_node_id: 0,
        }
    }

    /// Hand out the next plan node id (unique within the query)
    pub fn assign_plan_node_id(&mut self) -> u32 {
        let id = self.next_plan_node_id;
        self.next_plan_node_id += 1;
        id
    }
}

impl Default for PlannerInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Base relation a path scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelOptInfo {
    /// Range table index; 0 for join relations
    pub relid: u32,
    /// Relation name
    pub name: String,
}

impl RelOptInfo {
    pub fn new(relid: u32, name: impl Into<String>) -> Self {
        Self {
            relid,
            name: name.into(),
        }
    }
}

/// One output column: take input column `column` and emit it as `name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    /// 1-based output position
    pub resno: usize,
    /// Output column name
    pub name: String,
    /// 0-based input column
    pub column: usize,
}

impl TargetEntry {
    pub fn new(resno: usize, name: impl Into<String>, column: usize) -> Self {
        Self {
            resno,
            name: name.into(),
            column,
        }
    }
}

/// Comparison operator of a restriction clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ClauseOp {
    /// Operator symbol for explain output
    pub fn symbol(&self) -> &'static str {
        match self {
            ClauseOp::Eq => "=",
            ClauseOp::Lt => "<",
            ClauseOp::Lte => "<=",
            ClauseOp::Gt => ">",
            ClauseOp::Gte => ">=",
        }
    }
}

/// Restriction clause `column op value`
///
/// No type coercion: numbers compare with numbers (`1` equals `1.0`),
/// strings with strings. Other values only support `=`; NULL never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// 0-based input column
    pub column: usize,
    pub op: ClauseOp,
    pub value: Value,
}

impl Clause {
    pub fn new(column: usize, op: ClauseOp, value: Value) -> Self {
        Self { column, op, value }
    }

    /// Whether `tuple` satisfies this clause
    pub fn matches(&self, tuple: &Tuple) -> bool {
        let actual = match tuple.get(self.column) {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };

        match compare(actual, &self.value) {
            Some(ord) => match self.op {
                ClauseOp::Lt => ord == Ordering::Less,
                ClauseOp::Lte => ord != Ordering::Greater,
                ClauseOp::Gt => ord == Ordering::Greater,
                ClauseOp::Gte => ord != Ordering::Less,
                ClauseOp::Eq => ord == Ordering::Equal,
            },
            None => self.op == ClauseOp::Eq && actual == &self.value,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${} {} {}", self.column, self.op.symbol(), self.value)
    }
}

fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                return Some(ai.cmp(&bi));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Capability flags a custom path declares
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomPathFlags(u32);

impl CustomPathFlags {
    pub const NONE: CustomPathFlags = CustomPathFlags(0);
    /// Provider can produce tuples in backward direction
    pub const SUPPORT_BACKWARD_SCAN: CustomPathFlags = CustomPathFlags(0x0001);
    /// Provider implements mark/restore
    pub const SUPPORT_MARK_RESTORE: CustomPathFlags = CustomPathFlags(0x0002);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: CustomPathFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: CustomPathFlags) -> CustomPathFlags {
        CustomPathFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for CustomPathFlags {
    type Output = CustomPathFlags;

    fn bitor(self, rhs: CustomPathFlags) -> CustomPathFlags {
        self.union(rhs)
    }
}

/// Candidate access path produced by a custom scan provider
///
/// `methods` travels by reference inside the planner's path tree; it is
/// never looked up by name.
#[derive(Clone)]
pub struct CustomPath {
    pub methods: &'static dyn PathMethods,
    pub flags: CustomPathFlags,
    /// Estimated output rows
    pub rows: f64,
    pub startup_cost: f64,
    pub total_cost: f64,
    /// Child paths this path consumes (custom joins)
    pub custom_paths: Vec<CustomPath>,
    /// Provider-private data, opaque to the engine
    pub custom_private: Value,
}

impl CustomPath {
    pub fn new(methods: &'static dyn PathMethods, flags: CustomPathFlags) -> Self {
        Self {
            methods,
            flags,
            rows: 0.0,
            startup_cost: 0.0,
            total_cost: 0.0,
            custom_paths: Vec::new(),
            custom_private: Value::Null,
        }
    }

    pub fn with_private(mut self, custom_private: Value) -> Self {
        self.custom_private = custom_private;
        self
    }

    pub fn with_costs(mut self, rows: f64, startup_cost: f64, total_cost: f64) -> Self {
        self.rows = rows;
        self.startup_cost = startup_cost;
        self.total_cost = total_cost;
        self
    }
}

impl fmt::Debug for CustomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPath")
            .field("provider", &self.methods.name())
            .field("flags", &self.flags)
            .field("rows", &self.rows)
            .field("total_cost", &self.total_cost)
            .field("custom_paths", &self.custom_paths.len())
            .finish()
    }
}
