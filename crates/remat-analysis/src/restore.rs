//! Output reconstruction.
//!
//! The search works on a marker-free stream; before a schedule is
//! written back out, its release points are turned into explicit
//! `.dealloc` tasks again. A final replay verifies the restored stream
//! is self-consistent: every read hits a resident operand and exactly
//! the must-survive set is resident at exit.

use std::collections::BTreeSet;

use remat_ir::{Common, Handle, Operand, Schedule, Task};

use crate::{analyze, AnalysisError};

/// Splices a `.dealloc` task after every task that releases operands.
///
/// Marker tasks receive fresh occurrence ids above the compute tasks'
/// range; attribute payloads travel with the cloned compute tasks.
pub fn restore_deallocs(common: &Common, schedule: &Schedule) -> Result<Schedule, AnalysisError> {
    let analysis = analyze(common, schedule)?;

    let mut next_id = schedule
        .tasks
        .iter()
        .map(|t| t.id)
        .max()
        .map_or(0, |m| m + 1);

    let mut tasks = Vec::with_capacity(schedule.len());
    for (t, task) in schedule.tasks.iter().enumerate() {
        tasks.push(task.clone());
        let released = &analysis.topology.tasks[t].dealloc_after;
        if !released.is_empty() {
            let wire = released.iter().map(|&p| common.operands[p].id).collect();
            tasks.push(Task::dealloc(next_id, released.clone(), wire));
            next_id += 1;
        }
    }
    Ok(Schedule::new(tasks))
}

/// Replays a restored stream, honoring its markers, and verifies the
/// exit live set equals the must-survive set.
pub fn check_restored(common: &Common, restored: &Schedule) -> Result<(), AnalysisError> {
    let mut live: BTreeSet<Handle<Operand>> = common.already_on.clone();

    for (index, task) in restored.tasks.iter().enumerate() {
        if task.is_dealloc() {
            for &p in &task.outs {
                if !live.remove(&p) {
                    return Err(AnalysisError::DeallocNotLive {
                        index,
                        operand: common.operands[p].id,
                    });
                }
            }
            continue;
        }
        for &p in &task.ins {
            if !live.contains(&p) {
                return Err(AnalysisError::InputNotLive {
                    name: task.name.clone(),
                    index,
                    operand: common.operands[p].id,
                });
            }
        }
        for &p in &task.outs {
            live.insert(p);
        }
    }

    if let Some(&leaked) = live.difference(&common.not_dealloc).next() {
        return Err(AnalysisError::ExitOperandLeaked {
            operand: common.operands[leaked].id,
        });
    }
    if let Some(&missing) = common.not_dealloc.difference(&live).next() {
        return Err(AnalysisError::ExitOperandMissing {
            operand: common.operands[missing].id,
        });
    }
    Ok(())
}
