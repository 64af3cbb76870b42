//! Straight-line memory simulation.
//!
//! Replays a canonical schedule against the release points computed by
//! the topology pass. Each task's footprint is the resident total after
//! its outputs materialize, plus its workspace; releases take effect
//! after the task completes.

use std::collections::BTreeSet;

use remat_ir::{pretty_bytes, Common, Handle, Operand, Schedule};

use crate::topology::Topology;
use crate::AnalysisError;

/// Memory and time profile of one schedule.
#[derive(Clone, Debug, Default)]
pub struct MemoryProfile {
    /// Largest footprint reached by any task (or by the entry set).
    pub peak_memory: u64,
    /// First task whose footprint equals the peak; `None` when the
    /// stream is empty.
    pub peak_task: Option<usize>,
    /// Sum of task durations in nanoseconds.
    pub total_time: u64,
    /// Footprint of every task, in stream order.
    pub execution_memory: Vec<u64>,
    /// Resident total before the first task.
    pub entry_memory: u64,
}

/// Replays the stream and records footprints.
///
/// Fails if any task reads an operand that is not resident, or a
/// release point names a non-resident operand; either means the
/// schedule under analysis is inconsistent.
pub fn simulate_memory(
    common: &Common,
    schedule: &Schedule,
    topology: &Topology,
) -> Result<MemoryProfile, AnalysisError> {
    let mut live: BTreeSet<Handle<Operand>> = common.already_on.clone();
    let mut current: u64 = common.entry_memory();
    let entry_memory = current;

    let mut peak_memory = current;
    let mut peak_task = None;
    let mut execution_memory = Vec::with_capacity(schedule.len());
    let mut total_time = 0u64;

    for (t, task) in schedule.tasks.iter().enumerate() {
        for &p in &task.ins {
            if !live.contains(&p) {
                return Err(AnalysisError::InputNotLive {
                    name: task.name.clone(),
                    index: t,
                    operand: common.operands[p].id,
                });
            }
        }
        for &p in &task.outs {
            if live.insert(p) {
                current += common.operands[p].size;
            }
        }
        let footprint = current + task.workspace;
        execution_memory.push(footprint);
        if footprint > peak_memory {
            peak_memory = footprint;
            peak_task = Some(t);
        }
        for &p in &topology.tasks[t].dealloc_after {
            if !live.remove(&p) {
                return Err(AnalysisError::DeallocNotLive {
                    index: t,
                    operand: common.operands[p].id,
                });
            }
            current -= common.operands[p].size;
        }
        total_time += task.duration;
    }

    log::debug!(
        "simulated {} tasks: peak {} at position {:?}",
        schedule.len(),
        pretty_bytes(peak_memory),
        peak_task,
    );

    Ok(MemoryProfile {
        peak_memory,
        peak_task,
        total_time,
        execution_memory,
        entry_memory,
    })
}
