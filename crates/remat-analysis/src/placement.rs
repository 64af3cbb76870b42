//! Placement analysis over the marker-bearing stream.
//!
//! Determines which operands are resident when the schedule starts
//! (read before any in-stream producer writes them) and which must
//! remain resident when it ends (still live after the last marker).
//! Runs exactly once per case, before `.share` resolution.

use std::collections::BTreeSet;

use remat_ir::{Arena, Handle, Operand, Schedule};

use crate::AnalysisError;

/// Boundary liveness of a case.
#[derive(Clone, Debug, Default)]
pub struct Placement {
    /// Operands resident before the first task runs.
    pub already_on: BTreeSet<Handle<Operand>>,
    /// Operands still resident after the last task runs.
    pub not_dealloc: BTreeSet<Handle<Operand>>,
}

/// Walks the loaded stream, honoring `.dealloc` markers, and derives
/// the boundary sets.
///
/// Also validates the stream: every read must hit a resident operand
/// (first reads of never-written operands seed `already_on`), and every
/// `.dealloc` output must be resident.
pub fn analyze_placement(
    operands: &Arena<Operand>,
    schedule: &Schedule,
) -> Result<Placement, AnalysisError> {
    let mut written: BTreeSet<Handle<Operand>> = BTreeSet::new();
    let mut live: BTreeSet<Handle<Operand>> = BTreeSet::new();
    let mut already_on: BTreeSet<Handle<Operand>> = BTreeSet::new();

    for (index, task) in schedule.tasks.iter().enumerate() {
        if task.is_dealloc() {
            for &p in &task.outs {
                if !live.remove(&p) {
                    return Err(AnalysisError::DeallocNotLive {
                        index,
                        operand: operands[p].id,
                    });
                }
            }
            continue;
        }
        for &p in &task.ins {
            if live.contains(&p) {
                continue;
            }
            if written.contains(&p) {
                return Err(AnalysisError::InputNotLive {
                    name: task.name.clone(),
                    index,
                    operand: operands[p].id,
                });
            }
            already_on.insert(p);
            live.insert(p);
        }
        for &p in &task.outs {
            written.insert(p);
            live.insert(p);
        }
    }

    Ok(Placement {
        already_on,
        not_dealloc: live,
    })
}

/// Removes every structural marker from the stream, leaving the pure
/// compute-task list the search operates on.
pub fn strip_markers(schedule: &mut Schedule) {
    schedule.tasks.retain(|t| !t.is_marker());
}
