//! Usage-chain construction over a canonical task stream.
//!
//! Two passes over the stream build, for every input and output slot,
//! the links the candidate generator navigates: the producing task of
//! the consumed version, the reader chain of each version, the next
//! regeneration of each operand, and the terminal reader of each
//! version. The forward pass also assigns versions and decides where
//! each operand generation is released.
//!
//! A *version* fingerprints the computation that produced an operand
//! instance: a rolling hash seeded with the operator name and folded
//! with the input versions, times 131, plus the operand id. Two
//! executions of the same producer over the same input versions yield
//! the same version, which is what lets re-computed chains substitute
//! for the originals; seeding with the name keeps a no-input producer
//! and a consumer of version zero apart.

use std::collections::BTreeMap;

use remat_ir::{Common, Handle, Operand, Schedule, HASH_BASE};

/// Which side of a task a usage sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    /// Input slot.
    In,
    /// Output slot.
    Out,
}

/// Address of one operand usage: a slot on one side of one task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsageRef {
    /// Task position in the stream.
    pub task: usize,
    /// Input or output side.
    pub port: Port,
    /// Slot index within that side.
    pub slot: usize,
}

/// Dataflow links of one usage, rebuilt on every analysis.
#[derive(Clone, Copy, Debug, Default)]
pub struct UsageLinks {
    /// Version consumed (inputs) or produced (outputs).
    pub version: u64,
    /// Task that produced this version, if any producer is in-stream.
    pub gen: Option<usize>,
    /// Previous reader of the same version.
    pub prev_use: Option<UsageRef>,
    /// Next reader of the same version.
    pub next_use: Option<UsageRef>,
    /// Next task that re-produces the operand (for an input of a task
    /// that also writes the operand, that task itself).
    pub next_gen: Option<usize>,
    /// Terminal reader of this version, `None` for a version that is
    /// never read.
    pub last_use: Option<usize>,
}

/// Per-task analysis state.
#[derive(Clone, Debug, Default)]
pub struct TaskLinks {
    /// Position of the task in the stream.
    pub time_stamp: usize,
    /// Links of the input slots, parallel to `Task::ins`.
    pub ins: Vec<UsageLinks>,
    /// Links of the output slots, parallel to `Task::outs`.
    pub outs: Vec<UsageLinks>,
    /// Operands whose current generation dies right after this task.
    pub dealloc_after: Vec<Handle<Operand>>,
}

/// Usage chains for one schedule.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    /// One entry per task, in stream order.
    pub tasks: Vec<TaskLinks>,
}

impl Topology {
    /// Looks up the links of a usage.
    pub fn usage(&self, at: UsageRef) -> &UsageLinks {
        match at.port {
            Port::In => &self.tasks[at.task].ins[at.slot],
            Port::Out => &self.tasks[at.task].outs[at.slot],
        }
    }

    fn usage_mut(&mut self, at: UsageRef) -> &mut UsageLinks {
        match at.port {
            Port::In => &mut self.tasks[at.task].ins[at.slot],
            Port::Out => &mut self.tasks[at.task].outs[at.slot],
        }
    }

    /// The version of `operand` visible just before position `limit`,
    /// starting from a usage that consumed or produced it.
    ///
    /// Follows the regeneration chain: each `next_gen` strictly before
    /// `limit` supersedes the version seen so far.
    pub fn version_before(
        &self,
        schedule: &Schedule,
        operand: Handle<Operand>,
        from: UsageRef,
        limit: usize,
    ) -> u64 {
        let mut version = self.usage(from).version;
        let mut next = self.usage(from).next_gen;
        while let Some(writer) = next {
            if writer >= limit {
                break;
            }
            let slot = schedule.tasks[writer]
                .outs
                .iter()
                .position(|&o| o == operand)
                .expect("regeneration chain points at a non-producer");
            version = self.tasks[writer].outs[slot].version;
            next = self.tasks[writer].outs[slot].next_gen;
        }
        version
    }
}

/// Stable hash of an operator name; seeds every version so distinct
/// operators never share a rolling state.
fn operator_hash(name: &str) -> u64 {
    name.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(HASH_BASE).wrapping_add(b as u64))
}

/// Builds the usage chains of a canonical schedule.
pub fn analyze_topology(common: &Common, schedule: &Schedule) -> Topology {
    let n = schedule.len();
    let mut topo = Topology {
        tasks: schedule
            .tasks
            .iter()
            .enumerate()
            .map(|(t, task)| TaskLinks {
                time_stamp: t,
                ins: vec![UsageLinks::default(); task.ins.len()],
                outs: vec![UsageLinks::default(); task.outs.len()],
                dealloc_after: Vec::new(),
            })
            .collect(),
    };

    // Forward: versions, producer links, reader chains, release points.
    let mut version: BTreeMap<Handle<Operand>, u64> = BTreeMap::new();
    let mut producer: BTreeMap<Handle<Operand>, usize> = BTreeMap::new();
    let mut last_reader: BTreeMap<Handle<Operand>, UsageRef> = BTreeMap::new();

    for (t, task) in schedule.tasks.iter().enumerate() {
        for (slot, &p) in task.ins.iter().enumerate() {
            let here = UsageRef {
                task: t,
                port: Port::In,
                slot,
            };
            let consumed = version
                .get(&p)
                .copied()
                .unwrap_or_else(|| common.operands[p].initial_version());
            let gen = producer.get(&p).copied();
            let prev = last_reader.get(&p).copied();
            {
                let links = &mut topo.tasks[t].ins[slot];
                links.version = consumed;
                links.gen = gen;
                links.prev_use = prev;
            }
            match prev {
                Some(prev_ref) => topo.usage_mut(prev_ref).next_use = Some(here),
                None => {
                    // First reader of the version: chain from the
                    // producing output slot.
                    if let Some(g) = gen {
                        if let Some(out) = schedule.tasks[g].outs.iter().position(|&o| o == p) {
                            topo.tasks[g].outs[out].next_use = Some(here);
                        }
                    }
                }
            }
            last_reader.insert(p, here);
        }

        let rolling = (0..task.ins.len()).fold(operator_hash(&task.name), |h, slot| {
            h.wrapping_mul(HASH_BASE)
                .wrapping_add(topo.tasks[t].ins[slot].version)
        });

        for (slot, &p) in task.outs.iter().enumerate() {
            // This write ends the previous generation: release it after
            // its terminal reader. A task never releases an operand it
            // writes itself.
            if let Some(reader) = last_reader.remove(&p) {
                if reader.task != t {
                    topo.tasks[reader.task].dealloc_after.push(p);
                }
            }
            let produced = rolling
                .wrapping_mul(HASH_BASE)
                .wrapping_add(common.operands[p].id);
            let links = &mut topo.tasks[t].outs[slot];
            links.version = produced;
            links.gen = Some(t);
            version.insert(p, produced);
            producer.insert(p, t);
        }
    }

    // Final generations: release after the terminal reader unless the
    // operand must survive the schedule.
    for (&p, &reader) in &last_reader {
        if !common.not_dealloc.contains(&p) && !schedule.tasks[reader.task].outs.contains(&p) {
            topo.tasks[reader.task].dealloc_after.push(p);
        }
    }

    // Backward: next regeneration of each operand.
    let mut next_writer: BTreeMap<Handle<Operand>, usize> = BTreeMap::new();
    for t in (0..n).rev() {
        let task = &schedule.tasks[t];
        for (slot, &p) in task.ins.iter().enumerate() {
            topo.tasks[t].ins[slot].next_gen = if task.outs.contains(&p) {
                Some(t)
            } else {
                next_writer.get(&p).copied()
            };
        }
        for (slot, &p) in task.outs.iter().enumerate() {
            topo.tasks[t].outs[slot].next_gen = next_writer.get(&p).copied();
        }
        for &p in &task.outs {
            next_writer.insert(p, t);
        }
    }

    // Backward again: terminal reader of every version. `next_use`
    // always points forward, so the tail of a later usage is already
    // resolved when an earlier one asks for it.
    for t in (0..n).rev() {
        for slot in (0..topo.tasks[t].outs.len()).rev() {
            topo.tasks[t].outs[slot].last_use = match topo.tasks[t].outs[slot].next_use {
                None => None,
                Some(next) => topo.usage(next).last_use,
            };
        }
        for slot in (0..topo.tasks[t].ins.len()).rev() {
            topo.tasks[t].ins[slot].last_use = match topo.tasks[t].ins[slot].next_use {
                None => Some(t),
                Some(next) => topo.usage(next).last_use,
            };
        }
    }

    topo
}
