//! Schedules and their shared context.

use std::collections::BTreeSet;

use crate::arena::{Arena, Handle};
use crate::operand::Operand;
use crate::task::Task;

/// Multiplier of every rolling hash in the system.
pub const HASH_BASE: u64 = 131;

/// State shared by every schedule derived from one loaded case.
///
/// Immutable once canonicalization has run; schedules reference it and
/// never mutate it, so any number of candidate schedules can share one
/// instance.
#[derive(Clone, Debug, Default)]
pub struct Common {
    /// All operand descriptors of the case.
    pub operands: Arena<Operand>,
    /// Operands that must be resident when the schedule starts.
    pub already_on: BTreeSet<Handle<Operand>>,
    /// Operands that must still be resident when the schedule ends.
    pub not_dealloc: BTreeSet<Handle<Operand>>,
}

impl Common {
    /// Total size of the operands resident at entry.
    pub fn entry_memory(&self) -> u64 {
        self.already_on
            .iter()
            .map(|&h| self.operands[h].size)
            .sum()
    }
}

/// An ordered stream of tasks.
///
/// Vector position is execution order. Tasks are owned by exactly one
/// schedule; [`Schedule::fork`] deep-copies them so rewrites on a child
/// can never alias state with its parent.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
}

impl Schedule {
    /// Creates a schedule from an ordered task list.
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Number of tasks in the stream.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the stream has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Deep copy for use as a rewrite child.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Sum of all task durations in nanoseconds.
    pub fn total_duration(&self) -> u64 {
        self.tasks.iter().map(|t| t.duration).sum()
    }

    /// Structural fingerprint: a rolling hash of occurrence ids in
    /// stream order. Two schedules with the same task-id sequence hash
    /// identically, which is what the search's dedup set relies on.
    pub fn structural_hash(&self) -> u64 {
        self.tasks.iter().fold(0u64, |h, t| {
            h.wrapping_mul(HASH_BASE).wrapping_add(u64::from(t.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn task(id: u32, duration: u64) -> Task {
        Task::new(id, "op", vec![], vec![], 0, duration, Value::Null, vec![], vec![])
    }

    #[test]
    fn hash_depends_only_on_id_sequence() {
        let a = Schedule::new(vec![task(1, 5), task(2, 6), task(3, 7)]);
        let mut b = Schedule::new(vec![task(1, 50), task(2, 60), task(3, 70)]);
        b.tasks[0].name = "renamed".into();
        assert_eq!(a.structural_hash(), b.structural_hash());

        let swapped = Schedule::new(vec![task(2, 6), task(1, 5), task(3, 7)]);
        assert_ne!(a.structural_hash(), swapped.structural_hash());
    }

    #[test]
    fn fork_is_independent() {
        let a = Schedule::new(vec![task(1, 5)]);
        let mut b = a.fork();
        b.tasks[0].name = "other".into();
        assert_eq!(a.tasks[0].name, "op");
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn totals() {
        let s = Schedule::new(vec![task(1, 5), task(2, 6)]);
        assert_eq!(s.total_duration(), 11);
        assert_eq!(s.len(), 2);
        assert!(!s.is_empty());
    }

    #[test]
    fn entry_memory_sums_resident_operands() {
        let mut common = Common::default();
        let a = common.operands.append(Operand::new(0, 100));
        let _b = common.operands.append(Operand::new(1, 200));
        let c = common.operands.append(Operand::new(2, 300));
        common.already_on.insert(a);
        common.already_on.insert(c);
        assert_eq!(common.entry_memory(), 400);
    }
}
