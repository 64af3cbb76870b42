//! Schedule rewriting.
//!
//! Applying an occupy to a parent schedule produces a child that shares
//! the parent's `Common` context but owns deep copies of every task.
//! The re-executed ancestors and the producer are spliced immediately
//! before the consumer; a relocatable producer disappears from its
//! original position.

use remat_ir::Schedule;

use crate::occupy::Occupy;

/// Produces the child schedule of one candidate rewrite.
///
/// Copies keep their occurrence ids, so the child's structural hash
/// reflects exactly which rewrite produced it.
pub fn apply(parent: &Schedule, occupy: &Occupy) -> Schedule {
    let mut tasks = Vec::with_capacity(parent.len() + 1 + occupy.re_gen.len());
    for (i, task) in parent.tasks.iter().enumerate() {
        if i == occupy.use_at {
            for &r in occupy.re_gen.iter().rev() {
                tasks.push(parent.tasks[r].clone());
            }
            tasks.push(parent.tasks[occupy.gen].clone());
        }
        if i == occupy.gen && occupy.move_gen {
            continue;
        }
        tasks.push(task.clone());
    }
    Schedule::new(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remat_ir::Task;
    use serde_json::Value;

    fn schedule_of(ids: &[u32]) -> Schedule {
        Schedule::new(
            ids.iter()
                .map(|&id| {
                    Task::new(id, format!("op{id}"), vec![], vec![], 0, 1, Value::Null, vec![], vec![])
                })
                .collect(),
        )
    }

    fn occupy(gen: usize, use_at: usize, re_gen: Vec<usize>, move_gen: bool) -> Occupy {
        Occupy {
            gen,
            use_at,
            re_gen,
            re_gen_ins: vec![],
            move_gen,
            memory_delta: 0,
            time_delta: 0,
            time_heavy_score: 0.0,
            memory_heavy_score: 0.0,
        }
    }

    #[test]
    fn duplicate_grows_the_stream_by_the_plan_size() {
        let parent = schedule_of(&[0, 1, 2, 3]);

        let child = apply(&parent, &occupy(0, 3, vec![], false));
        let ids: Vec<_> = child.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 3]);
        assert_eq!(child.len(), parent.len() + 1);

        let chained = apply(&parent, &occupy(2, 3, vec![1, 0], false));
        let ids: Vec<_> = chained.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 2, 3]);
        assert_eq!(chained.len(), parent.len() + 3);
    }

    #[test]
    fn move_keeps_the_task_count() {
        let parent = schedule_of(&[0, 1, 2, 3]);
        let child = apply(&parent, &occupy(0, 3, vec![], true));
        let ids: Vec<_> = child.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 0, 3]);
        assert_eq!(child.len(), parent.len());
    }

    #[test]
    fn parent_is_untouched_and_hashes_differ() {
        let parent = schedule_of(&[0, 1, 2, 3]);
        let before = parent.structural_hash();
        let child = apply(&parent, &occupy(0, 2, vec![], false));
        assert_eq!(parent.structural_hash(), before);
        assert_ne!(child.structural_hash(), before);
    }

    #[test]
    fn identical_rewrites_produce_identical_hashes() {
        let parent = schedule_of(&[0, 1, 2, 3]);
        let a = apply(&parent, &occupy(1, 3, vec![0], false));
        let b = apply(&parent, &occupy(1, 3, vec![0], false));
        assert_eq!(a.structural_hash(), b.structural_hash());
    }
}
