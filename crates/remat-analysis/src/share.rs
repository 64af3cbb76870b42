//! `.share` alias resolution.
//!
//! A `.share` task declares that its outputs are the same storage as
//! its single input. Resolution rewrites every slot in the stream to
//! the canonical operand so later analyses never see aliases; the
//! original per-slot ids stay on each task (`wire_ins` / `wire_outs`),
//! keeping the transformation invertible.

use std::collections::{BTreeMap, BTreeSet};

use remat_ir::{Arena, Handle, Operand, Schedule};

use crate::AnalysisError;

/// Mapping from alias operands to their canonical storage.
#[derive(Clone, Debug, Default)]
pub struct ShareMap {
    root: BTreeMap<Handle<Operand>, Handle<Operand>>,
}

impl ShareMap {
    /// Resolves an operand to its canonical storage (itself when it was
    /// never aliased). Sources may be reached through a chain of
    /// earlier declarations; the walk follows it to the root.
    pub fn canonical(&self, mut handle: Handle<Operand>) -> Handle<Operand> {
        while let Some(&next) = self.root.get(&handle) {
            handle = next;
        }
        handle
    }

    /// Whether the operand was aliased away.
    pub fn is_alias(&self, handle: Handle<Operand>) -> bool {
        self.root.contains_key(&handle)
    }

    /// Number of aliased operands.
    pub fn alias_count(&self) -> usize {
        self.root.len()
    }
}

/// Resolves all `.share` tasks in the stream, rewriting every slot of
/// every task to canonical operands.
///
/// Structural rules: an operand may not appear as a `.share` source
/// after it has been introduced as an alias, and no operand may be
/// introduced as an alias twice.
pub fn resolve_shares(
    operands: &Arena<Operand>,
    schedule: &mut Schedule,
) -> Result<ShareMap, AnalysisError> {
    let mut map = ShareMap::default();
    let mut aliased: BTreeSet<Handle<Operand>> = BTreeSet::new();

    for (index, task) in schedule.tasks.iter().enumerate() {
        if !task.is_share() {
            continue;
        }
        let source = task.ins[0];
        if aliased.contains(&source) {
            return Err(AnalysisError::ShareSourceAliased {
                index,
                operand: operands[source].id,
            });
        }
        for &alias in &task.outs {
            if aliased.contains(&alias) {
                return Err(AnalysisError::ShareAliasReused {
                    index,
                    operand: operands[alias].id,
                });
            }
            aliased.insert(alias);
            map.root.insert(alias, source);
        }
    }

    for task in &mut schedule.tasks {
        if task.is_share() {
            continue;
        }
        for slot in task.ins.iter_mut().chain(task.outs.iter_mut()) {
            *slot = map.canonical(*slot);
        }
    }

    Ok(map)
}
