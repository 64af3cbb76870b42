//! Candidate enumeration and scoring.
//!
//! An occupy pair is a producer whose output sits resident across the
//! memory peak and that output's first consumer after the peak.
//! Re-executing the producer just before the consumer lets the operand
//! be released before the peak. Expansion pulls in whatever ancestors
//! must also re-run for the producer to see the versions it originally
//! consumed; candidates whose chains grow past [`MAX_REGEN_CHAIN`], or
//! whose re-execution would clobber a version some later task still
//! needs, are dropped.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use remat_analysis::{Analysis, Port, Topology, UsageRef};
use remat_ir::{Common, Handle, Operand, Schedule, HASH_BASE};

use crate::{
    CANDIDATES_PER_SCHEME, MAX_REGEN_CHAIN, MEMORY_HEAVY_WEIGHTS, ROUNDS_PER_RANDOM_PICK,
    TIME_HEAVY_WEIGHTS,
};

/// One re-materialization candidate over a specific parent schedule.
///
/// All task references are positions in the parent's stream.
#[derive(Clone, Debug)]
pub struct Occupy {
    /// Producer to re-execute.
    pub gen: usize,
    /// First post-peak consumer; the re-execution is spliced before it.
    pub use_at: usize,
    /// Ancestors that must re-run as well, stored latest-first; the
    /// rewrite splices them in reverse.
    pub re_gen: Vec<usize>,
    /// Input usages the re-executed set reads from the rest of the
    /// stream.
    pub re_gen_ins: Vec<UsageRef>,
    /// Whether the original producer can be deleted (no reader of its
    /// outputs before the splice point).
    pub move_gen: bool,
    /// Net resident-set change at the peak, in bytes.
    pub memory_delta: i64,
    /// Added runtime in nanoseconds.
    pub time_delta: u64,
    /// Score under [`TIME_HEAVY_WEIGHTS`]; lower is better.
    pub time_heavy_score: f64,
    /// Score under [`MEMORY_HEAVY_WEIGHTS`]; lower is better.
    pub memory_heavy_score: f64,
}

/// Enumerates, scores, and prunes the candidates of one schedule.
///
/// `iteration` feeds the seed of the random extra pick so runs are
/// reproducible; `origin_time` is the seed schedule's total runtime,
/// the denominator of every time score.
pub fn enumerate_occupies(
    common: &Common,
    schedule: &Schedule,
    analysis: &Analysis,
    iteration: usize,
    origin_time: u64,
) -> Vec<Occupy> {
    let Some(peak) = analysis.memory.peak_task else {
        return Vec::new();
    };
    let topo = &analysis.topology;
    let peak_memory = analysis.memory.peak_memory;

    let mut seen_gens: BTreeSet<usize> = BTreeSet::new();
    let mut candidates = Vec::new();
    for use_at in (peak + 1)..schedule.len() {
        for slot in 0..schedule.tasks[use_at].ins.len() {
            let Some(gen) = topo.tasks[use_at].ins[slot].gen else {
                continue;
            };
            if gen >= peak {
                continue;
            }
            // Only the first post-peak consumer per producer.
            if !seen_gens.insert(gen) {
                continue;
            }
            if let Some(candidate) = expand(
                common,
                schedule,
                topo,
                peak,
                gen,
                use_at,
                peak_memory,
                origin_time,
            ) {
                candidates.push(candidate);
            }
        }
    }

    log::debug!(
        "round {iteration}: {} feasible candidates across peak at {peak}",
        candidates.len(),
    );
    prune(candidates, iteration, schedule.structural_hash())
}

/// Builds the full re-materialization plan for one `(gen, use)` pair,
/// or rejects it.
#[allow(clippy::too_many_arguments)]
fn expand(
    common: &Common,
    schedule: &Schedule,
    topo: &Topology,
    peak: usize,
    gen: usize,
    use_at: usize,
    peak_memory: u64,
    origin_time: u64,
) -> Option<Occupy> {
    let mut re_gen: Vec<usize> = Vec::new();
    let mut re_gen_ins: Vec<UsageRef> = Vec::new();
    let mut members: BTreeSet<usize> = BTreeSet::from([gen]);
    let mut work: Vec<usize> = vec![gen];

    while let Some(t) = work.pop() {
        for (slot, &p) in schedule.tasks[t].ins.iter().enumerate() {
            let at = UsageRef {
                task: t,
                port: Port::In,
                slot,
            };
            let links = topo.usage(at);
            // Produced inside the re-executed set: the spliced copy
            // regenerates the exact version.
            if links.gen.is_some_and(|src| members.contains(&src)) {
                continue;
            }
            let available = topo.version_before(schedule, p, at, use_at);
            if available == links.version {
                re_gen_ins.push(at);
                continue;
            }
            // The consumed version is gone by the splice point; its
            // producer has to re-run too.
            let src = links.gen?;
            if re_gen.len() == MAX_REGEN_CHAIN {
                return None;
            }
            re_gen.push(src);
            members.insert(src);
            work.push(src);
        }
    }
    for &member in &members {
        if !write_back_safe(common, schedule, topo, member, use_at) {
            return None;
        }
    }
    // Splice order is ascending stream position; store the reverse.
    re_gen.sort_unstable_by(|a, b| b.cmp(a));

    let move_gen = relocatable(topo, schedule, gen, use_at);

    // Inputs whose life gets stretched across the peak: external reads
    // whose version would otherwise die before it.
    let mut prolonged: BTreeSet<Handle<Operand>> = BTreeSet::new();
    for &at in &re_gen_ins {
        let p = schedule.tasks[at.task].ins[at.slot];
        if topo.usage(at).last_use.is_some_and(|l| l < peak) {
            prolonged.insert(p);
        }
    }
    let extended: u64 = prolonged.iter().map(|&p| common.operands[p].size).sum();

    // Operands of `gen` that stop spanning the peak.
    let mut freed_set: BTreeSet<Handle<Operand>> = BTreeSet::new();
    for (slot, &p) in schedule.tasks[use_at].ins.iter().enumerate() {
        let links = topo.tasks[use_at].ins[slot];
        if links.gen != Some(gen) {
            continue;
        }
        let idle_since_peak = match links.prev_use {
            None => true,
            Some(r) => r.task < peak,
        };
        if idle_since_peak {
            freed_set.insert(p);
        }
    }
    let freed: u64 = freed_set.iter().map(|&p| common.operands[p].size).sum();

    let memory_delta = extended as i64 - freed as i64;
    let time_delta: u64 = re_gen
        .iter()
        .map(|&t| schedule.tasks[t].duration)
        .sum::<u64>()
        + if move_gen {
            0
        } else {
            schedule.tasks[gen].duration
        };

    let score = |weights: (f64, f64)| {
        memory_delta as f64 / peak_memory.max(1) as f64 * weights.0
            + time_delta as f64 / origin_time.max(1) as f64 * weights.1
    };

    Some(Occupy {
        gen,
        use_at,
        re_gen,
        re_gen_ins,
        move_gen,
        memory_delta,
        time_delta,
        time_heavy_score: score(TIME_HEAVY_WEIGHTS),
        memory_heavy_score: score(MEMORY_HEAVY_WEIGHTS),
    })
}

/// Whether re-running `member` just before `use_at` leaves every later
/// consumer of its outputs with the version it expects.
///
/// If an output was regenerated between `member` and the splice point,
/// the re-execution rolls it back. That is tolerable only when the
/// newer version has no reader at or after the splice point and is not
/// the operand's final, must-survive state.
fn write_back_safe(
    common: &Common,
    schedule: &Schedule,
    topo: &Topology,
    member: usize,
    use_at: usize,
) -> bool {
    for (slot, &q) in schedule.tasks[member].outs.iter().enumerate() {
        let mut newest: Option<usize> = None;
        let mut next = topo.tasks[member].outs[slot].next_gen;
        while let Some(writer) = next {
            if writer >= use_at {
                break;
            }
            newest = Some(writer);
            let out = schedule.tasks[writer]
                .outs
                .iter()
                .position(|&o| o == q)
                .expect("regeneration chain points at a non-producer");
            next = topo.tasks[writer].outs[out].next_gen;
        }
        let Some(writer) = newest else {
            continue;
        };
        let out = schedule.tasks[writer]
            .outs
            .iter()
            .position(|&o| o == q)
            .expect("regeneration chain points at a non-producer");
        let links = topo.tasks[writer].outs[out];
        let mut reader = links.next_use;
        while let Some(r) = reader {
            if r.task >= use_at {
                return false;
            }
            reader = topo.usage(r).next_use;
        }
        if common.not_dealloc.contains(&q) && links.next_gen.is_none() {
            return false;
        }
    }
    true
}

/// Whether deleting the original producer is safe: no reader of any of
/// its produced versions sits before the splice point.
fn relocatable(topo: &Topology, schedule: &Schedule, gen: usize, use_at: usize) -> bool {
    for slot in 0..schedule.tasks[gen].outs.len() {
        // Reader chains are in stream order, so the first entry decides.
        if let Some(r) = topo.tasks[gen].outs[slot].next_use {
            if r.task < use_at {
                return false;
            }
        }
    }
    true
}

/// Keeps the best candidates of each scoring scheme plus a seeded
/// random extra, preserving enumeration order.
fn prune(candidates: Vec<Occupy>, iteration: usize, schedule_hash: u64) -> Vec<Occupy> {
    if candidates.len() <= CANDIDATES_PER_SCHEME {
        return candidates;
    }

    let mut picked: BTreeSet<usize> = BTreeSet::new();
    let mut by_time: Vec<usize> = (0..candidates.len()).collect();
    by_time.sort_by(|&a, &b| {
        candidates[a]
            .time_heavy_score
            .total_cmp(&candidates[b].time_heavy_score)
    });
    picked.extend(by_time.iter().take(CANDIDATES_PER_SCHEME));

    let mut by_memory: Vec<usize> = (0..candidates.len()).collect();
    by_memory.sort_by(|&a, &b| {
        candidates[a]
            .memory_heavy_score
            .total_cmp(&candidates[b].memory_heavy_score)
    });
    picked.extend(by_memory.iter().take(CANDIDATES_PER_SCHEME));

    if iteration % ROUNDS_PER_RANDOM_PICK == 0 {
        let seed = schedule_hash
            .wrapping_mul(HASH_BASE)
            .wrapping_add(iteration as u64);
        let mut rng = StdRng::seed_from_u64(seed);
        picked.insert(rng.gen_range(0..candidates.len()));
    }

    let mut kept = Vec::with_capacity(picked.len());
    for (i, candidate) in candidates.into_iter().enumerate() {
        if picked.contains(&i) {
            kept.push(candidate);
        }
    }
    kept
}
