//! Parallel execution sub-protocol
//!
//! Ordering for one plan node across a coordinator and its workers:
//!
//! 1. coordinator: `estimate_dsm` exactly once
//! 2. coordinator: `initialize_dsm` exactly once, after (1)
//! 3. each worker: `initialize_worker` exactly once, after (2)
//!
//! Workers never run (1) or (2). [`ParallelScanCoordinator`] enforces the
//! ordering; the shared region itself is only ever touched by providers.
//! Ordering is the whole contract: providers that keep mutable state in
//! the region go through its own synchronized accessors.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::observability::{log_event_with_fields, Event};

use super::errors::{CustomScanError, CustomScanResult};
use super::estate::ExecRole;
use super::node::CustomScanState;

/// Fixed-size byte region shared by a coordinator and its workers
#[derive(Debug, Clone)]
pub struct SharedRegion {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedRegion {
    /// Allocate a zero-filled region
    pub fn zeroed(size: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![0u8; size])),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a little-endian u64 at `offset`
    pub fn read_u64(&self, offset: usize) -> CustomScanResult<u64> {
        let bytes = self.lock()?;
        let slot = Self::slot(&bytes, offset)?;
        Ok(u64::from_le_bytes(slot))
    }

    /// Write a little-endian u64 at `offset`
    pub fn write_u64(&self, offset: usize, value: u64) -> CustomScanResult<()> {
        let mut bytes = self.lock()?;
        Self::slot(&bytes, offset)?;
        bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Atomically add `delta` to the u64 at `offset`, returning the old value
    pub fn fetch_add_u64(&self, offset: usize, delta: u64) -> CustomScanResult<u64> {
        let mut bytes = self.lock()?;
        let old = u64::from_le_bytes(Self::slot(&bytes, offset)?);
        bytes[offset..offset + 8].copy_from_slice(&old.wrapping_add(delta).to_le_bytes());
        Ok(old)
    }

    fn slot(bytes: &[u8], offset: usize) -> CustomScanResult<[u8; 8]> {
        let end = offset.checked_add(8).filter(|end| *end <= bytes.len());
        match end {
            Some(end) => {
                let mut slot = [0u8; 8];
                slot.copy_from_slice(&bytes[offset..end]);
                Ok(slot)
            }
            None => Err(CustomScanError::parallel_protocol(format!(
                "shared region access at offset {} outside {} bytes",
                offset,
                bytes.len()
            ))),
        }
    }

    fn lock(&self) -> CustomScanResult<MutexGuard<'_, Vec<u8>>> {
        self.bytes
            .lock()
            .map_err(|_| CustomScanError::internal("shared region lock poisoned"))
    }
}

/// Table of contents of a shared segment: plan node id → region
#[derive(Debug, Clone, Default)]
pub struct ShmToc {
    entries: HashMap<u32, SharedRegion>,
}

impl ShmToc {
    pub fn insert(&mut self, plan_node_id: u32, region: SharedRegion) {
        self.entries.insert(plan_node_id, region);
    }

    pub fn lookup(&self, plan_node_id: u32) -> Option<&SharedRegion> {
        self.entries.get(&plan_node_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Coordinator-side context of one parallel query
#[derive(Debug, Clone)]
pub struct ParallelContext {
    pub segment_id: Uuid,
    pub nworkers: usize,
    estimated_bytes: usize,
    estimated_keys: usize,
    toc: ShmToc,
}

impl ParallelContext {
    pub fn new(nworkers: usize) -> Self {
        Self {
            segment_id: Uuid::new_v4(),
            nworkers,
            estimated_bytes: 0,
            estimated_keys: 0,
            toc: ShmToc::default(),
        }
    }

    /// Reserve `size` bytes under one more TOC key
    pub fn estimate_chunk(&mut self, size: usize) {
        self.estimated_bytes += size;
        self.estimated_keys += 1;
    }

    /// Total bytes reserved so far
    pub fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }

    pub fn estimated_keys(&self) -> usize {
        self.estimated_keys
    }

    pub fn toc(&self) -> &ShmToc {
        &self.toc
    }

    /// The TOC as a worker sees it after mapping the segment
    pub fn worker_toc(&self) -> ShmToc {
        self.toc.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParallelPhase {
    Idle,
    Estimated { size: usize },
    Initialized { size: usize },
}

impl ParallelPhase {
    fn name(&self) -> &'static str {
        match self {
            ParallelPhase::Idle => "IDLE",
            ParallelPhase::Estimated { .. } => "ESTIMATED",
            ParallelPhase::Initialized { .. } => "INITIALIZED",
        }
    }
}

/// Drives the parallel sub-protocol for one plan node
#[derive(Debug)]
pub struct ParallelScanCoordinator {
    plan_node_id: u32,
    provider: String,
    phase: ParallelPhase,
    attached: Mutex<HashSet<usize>>,
}

impl ParallelScanCoordinator {
    /// Coordinator for the plan node behind `node`
    pub fn new(node: &CustomScanState) -> Self {
        Self {
            plan_node_id: node.plan_node_id(),
            provider: node.provider().to_string(),
            phase: ParallelPhase::Idle,
            attached: Mutex::new(HashSet::new()),
        }
    }

    pub fn plan_node_id(&self) -> u32 {
        self.plan_node_id
    }

    /// Step 1: size the node's shared region
    pub fn estimate(
        &mut self,
        node: &mut CustomScanState,
        pcxt: &mut ParallelContext,
    ) -> CustomScanResult<usize> {
        self.check_node(node)?;
        if self.phase != ParallelPhase::Idle {
            return Err(self.out_of_order("estimate_dsm"));
        }

        let size = node.estimate_dsm(pcxt)?;
        pcxt.estimate_chunk(size);
        self.phase = ParallelPhase::Estimated { size };

        log_event_with_fields(
            Event::ParallelEstimate,
            &[
                ("provider", &self.provider),
                ("plan_node_id", &self.plan_node_id.to_string()),
                ("bytes", &size.to_string()),
            ],
        );
        Ok(size)
    }

    /// Step 2: allocate and populate the node's shared region
    pub fn initialize(
        &mut self,
        node: &mut CustomScanState,
        pcxt: &mut ParallelContext,
    ) -> CustomScanResult<SharedRegion> {
        self.check_node(node)?;
        let size = match self.phase {
            ParallelPhase::Estimated { size } => size,
            _ => return Err(self.out_of_order("initialize_dsm")),
        };

        let region = SharedRegion::zeroed(size);
        node.initialize_dsm(pcxt, &region)?;
        pcxt.toc.insert(self.plan_node_id, region.clone());
        self.phase = ParallelPhase::Initialized { size };

        log_event_with_fields(
            Event::ParallelInitialize,
            &[
                ("provider", &self.provider),
                ("plan_node_id", &self.plan_node_id.to_string()),
                ("segment_id", &pcxt.segment_id.to_string()),
            ],
        );
        Ok(region)
    }

    /// Step 3: bind one worker's node to the shared region
    pub fn attach_worker(
        &self,
        worker: &mut CustomScanState,
        toc: &ShmToc,
    ) -> CustomScanResult<()> {
        self.check_node(worker)?;
        if !matches!(self.phase, ParallelPhase::Initialized { .. }) {
            return Err(self.out_of_order("initialize_worker"));
        }
        let worker_number = match worker.role() {
            ExecRole::Worker(n) => n,
            ExecRole::Coordinator => {
                return Err(CustomScanError::parallel_protocol(format!(
                    "initialize_worker called with a coordinator node for provider \"{}\"",
                    self.provider
                )))
            }
        };
        let region = toc.lookup(self.plan_node_id).ok_or_else(|| {
            CustomScanError::parallel_protocol(format!(
                "no shared region for plan node {} in worker TOC",
                self.plan_node_id
            ))
        })?;

        let mut attached = self
            .attached
            .lock()
            .map_err(|_| CustomScanError::internal("parallel coordinator lock poisoned"))?;
        if attached.contains(&worker_number) {
            return Err(CustomScanError::parallel_protocol(format!(
                "worker {} already attached to plan node {}",
                worker_number, self.plan_node_id
            )));
        }

        worker.initialize_worker(toc, region)?;
        attached.insert(worker_number);

        log_event_with_fields(
            Event::ParallelWorkerAttach,
            &[
                ("provider", &self.provider),
                ("plan_node_id", &self.plan_node_id.to_string()),
                ("worker", &worker_number.to_string()),
            ],
        );
        Ok(())
    }

    /// Number of workers attached so far
    pub fn workers_attached(&self) -> usize {
        self.attached.lock().map(|a| a.len()).unwrap_or(0)
    }

    fn check_node(&self, node: &CustomScanState) -> CustomScanResult<()> {
        if node.plan_node_id() != self.plan_node_id || node.provider() != self.provider {
            return Err(CustomScanError::parallel_protocol(format!(
                "node {} (\"{}\") does not belong to coordinator for plan node {} (\"{}\")",
                node.plan_node_id(),
                node.provider(),
                self.plan_node_id,
                self.provider
            )));
        }
        Ok(())
    }

    fn out_of_order(&self, operation: &str) -> CustomScanError {
        CustomScanError::parallel_protocol(format!(
            "{} out of order for plan node {}: coordinator is {}",
            operation,
            self.plan_node_id,
            self.phase.name()
        ))
    }
}
