//! Custom scan plan node
//!
//! The plan node is the only piece of a custom scan that crosses a process
//! boundary. It names its provider by string; the executor recovers the
//! provider's `ScanPlanMethods` from the registry by that name.
//!
//! Handoff envelope:
//!
//! ```text
//! +------------------+
//! | Body Length      | (u32 LE)
//! +------------------+
//! | Body             | (JSON-encoded CustomScan)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of body)
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::observability::{log_event_with_fields, Event};

use super::errors::{CustomScanError, CustomScanResult};
use super::methods::ScanPlanMethods;
use super::path::{Clause, CustomPath, CustomPathFlags, PlannerInfo, RelOptInfo, TargetEntry};
use super::registry::{get_custom_scan_methods, CUSTOM_NAME_MAX_LEN};

const HEADER_LEN: usize = 4;
const CHECKSUM_LEN: usize = 4;

/// Finalized custom scan plan node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomScan {
    /// Unique within the plan tree; keys the node's shared region
    pub plan_node_id: u32,
    /// Range table index of the scanned relation; 0 for joins
    pub scanrelid: u32,
    pub flags: CustomPathFlags,
    /// Provider registry key
    pub custom_name: String,
    /// Child plan nodes
    #[serde(default)]
    pub custom_plans: Vec<CustomScan>,
    /// Restriction clauses the provider evaluates itself
    #[serde(default)]
    pub custom_exprs: Vec<Clause>,
    /// Provider-private data, opaque to the engine
    #[serde(default)]
    pub custom_private: Value,
    /// Output columns
    #[serde(default)]
    pub custom_scan_tlist: Vec<TargetEntry>,
}

impl CustomScan {
    /// Bare plan node for `custom_name`
    pub fn new(custom_name: impl Into<String>, scanrelid: u32) -> Self {
        Self {
            plan_node_id: 0,
            scanrelid,
            flags: CustomPathFlags::NONE,
            custom_name: custom_name.into(),
            custom_plans: Vec::new(),
            custom_exprs: Vec::new(),
            custom_private: Value::Null,
            custom_scan_tlist: Vec::new(),
        }
    }

    /// Check structural invariants of this node and its children
    pub fn validate(&self) -> CustomScanResult<()> {
        if self.custom_name.is_empty() {
            return Err(CustomScanError::plan_invalid(
                "custom scan plan node has an empty provider name",
            ));
        }
        if self.custom_name.len() > CUSTOM_NAME_MAX_LEN {
            return Err(CustomScanError::plan_invalid(format!(
                "provider name \"{}\" exceeds {} bytes",
                self.custom_name, CUSTOM_NAME_MAX_LEN
            )));
        }
        self.custom_plans.iter().try_for_each(CustomScan::validate)
    }

    /// Recover the provider's plan methods from the process-wide registry
    pub fn methods(&self) -> CustomScanResult<&'static dyn ScanPlanMethods> {
        get_custom_scan_methods(&self.custom_name, false)?
            .ok_or_else(|| CustomScanError::undefined_object(&self.custom_name))
    }

    /// Encode into a handoff envelope
    pub fn encode(&self) -> CustomScanResult<Vec<u8>> {
        let body = serde_json::to_vec(self).map_err(|e| {
            CustomScanError::plan_invalid(format!("failed to serialize plan node: {}", e))
        })?;
        let body_len = u32::try_from(body.len()).map_err(|_| {
            CustomScanError::plan_invalid(format!("plan node body too large: {} bytes", body.len()))
        })?;

        let mut buf = Vec::with_capacity(HEADER_LEN + body.len() + CHECKSUM_LEN);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&body);
        buf.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());

        log_event_with_fields(
            Event::PlanEncoded,
            &[
                ("provider", &self.custom_name),
                ("bytes", &buf.len().to_string()),
            ],
        );
        Ok(buf)
    }

    /// Decode and verify a handoff envelope
    pub fn decode(bytes: &[u8]) -> CustomScanResult<CustomScan> {
        let result = Self::decode_inner(bytes);
        match &result {
            Ok(plan) => log_event_with_fields(
                Event::PlanDecoded,
                &[("provider", &plan.custom_name)],
            ),
            Err(e) => log_event_with_fields(Event::PlanCorrupted, &[("reason", e.message())]),
        }
        result
    }

    fn decode_inner(bytes: &[u8]) -> CustomScanResult<CustomScan> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(CustomScanError::plan_corruption(format!(
                "plan envelope truncated: {} bytes",
                bytes.len()
            )));
        }

        let mut len_bytes = [0u8; HEADER_LEN];
        len_bytes.copy_from_slice(&bytes[..HEADER_LEN]);
        let body_len = u32::from_le_bytes(len_bytes) as usize;

        if bytes.len() != HEADER_LEN + body_len + CHECKSUM_LEN {
            return Err(CustomScanError::plan_corruption(format!(
                "plan envelope length mismatch: header says {} body bytes, envelope has {}",
                body_len,
                bytes.len()
            )));
        }

        let body = &bytes[HEADER_LEN..HEADER_LEN + body_len];
        let mut crc_bytes = [0u8; CHECKSUM_LEN];
        crc_bytes.copy_from_slice(&bytes[HEADER_LEN + body_len..]);
        let stored = u32::from_le_bytes(crc_bytes);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(CustomScanError::plan_corruption(format!(
                "plan envelope checksum mismatch: stored {:08x}, computed {:08x}",
                stored, computed
            )));
        }

        let plan: CustomScan = serde_json::from_slice(body).map_err(|e| {
            CustomScanError::plan_corruption(format!("plan node body is not decodable: {}", e))
        })?;
        plan.validate()?;
        Ok(plan)
    }
}

/// Turn a chosen custom path into a plan node
///
/// Invokes the path's `plan_custom_path`, stamps a plan node id and checks
/// that the node names the same provider as the path that produced it.
pub fn create_custom_scan_plan(
    root: &mut PlannerInfo,
    rel: &RelOptInfo,
    best_path: &CustomPath,
    tlist: &[TargetEntry],
    clauses: &[Clause],
    custom_plans: Vec<CustomScan>,
) -> CustomScanResult<CustomScan> {
    let provider = best_path.methods.name();
    let mut plan = best_path
        .methods
        .plan_custom_path(root, rel, best_path, tlist, clauses, custom_plans)?;

    if plan.custom_name != provider {
        return Err(CustomScanError::plan_invalid(format!(
            "path provider \"{}\" produced a plan node for \"{}\"",
            provider, plan.custom_name
        )));
    }
    plan.validate()?;
    plan.plan_node_id = root.assign_plan_node_id();

    log_event_with_fields(
        Event::PathPlanned,
        &[
            ("provider", provider),
            ("relation", &rel.name),
            ("plan_node_id", &plan.plan_node_id.to_string()),
        ],
    );
    Ok(plan)
}
