//! Best-first search over rewritten schedules.
//!
//! The queue is ordered by a budget-aware comparator: schedules inside
//! the memory budget beat schedules outside it, ties inside the budget
//! go to the faster schedule, and ties outside it go to a weighted
//! distance from the budget and the origin runtime. Peak memory is not
//! monotone under rewrites, so the search keeps mildly worse schedules
//! around ([`RECONSIDER_RATIO`]) instead of descending greedily.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use remat_analysis::{analyze, Analysis, AnalysisError, MemoryProfile};
use remat_ir::{pretty_bytes, pretty_duration, Common, Schedule};

use crate::occupy::enumerate_occupies;
use crate::rewrite::apply;
use crate::{
    MEMORY_FACTOR, PROGRESS_PRINT_EVERY, RECONSIDER_RATIO, SEARCH_LIMIT, TIME_FACTOR,
    TIME_TOLERANCE,
};

/// Ranks schedules against a memory budget and the origin runtime.
#[derive(Clone, Copy, Debug)]
pub struct Comparator {
    /// Total runtime of the seed schedule in nanoseconds.
    pub origin_time: u64,
    /// Device memory budget in bytes.
    pub limit: u64,
}

impl Comparator {
    /// Weighted distance from the budget and the origin runtime; lower
    /// is better, zero when inside the budget at origin speed.
    pub fn score(&self, profile: &MemoryProfile) -> f64 {
        let over = profile.peak_memory.saturating_sub(self.limit);
        let exceeded_memory = over as f64 / self.limit.max(1) as f64;
        let exceeded_time = (profile.total_time as f64 - self.origin_time as f64)
            / self.origin_time.max(1) as f64;
        MEMORY_FACTOR * exceeded_memory + TIME_FACTOR * exceeded_time
    }

    /// Strict-weak-order comparison; `Greater` means `a` ranks better.
    pub fn compare(&self, a: &MemoryProfile, b: &MemoryProfile) -> Ordering {
        let a_within = a.peak_memory <= self.limit;
        let b_within = b.peak_memory <= self.limit;
        match (a_within, b_within) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => b.total_time.cmp(&a.total_time),
            (false, false) => self.score(b).total_cmp(&self.score(a)),
        }
    }

    /// Whether `a` strictly outranks `b`.
    pub fn better(&self, a: &MemoryProfile, b: &MemoryProfile) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    /// Whether the schedule meets the budget within the accepted
    /// runtime inflation.
    pub fn satisfy(&self, profile: &MemoryProfile) -> bool {
        profile.peak_memory <= self.limit
            && profile.total_time as f64 <= TIME_TOLERANCE * self.origin_time as f64
    }

    /// Whether a schedule is close enough to the incumbent to stay in
    /// play.
    pub fn considerable(&self, profile: &MemoryProfile, best: &MemoryProfile) -> bool {
        self.score(profile) < RECONSIDER_RATIO * self.score(best)
    }
}

struct Entry {
    within: bool,
    time: u64,
    score: f64,
    seq: usize,
    schedule: Schedule,
    analysis: Analysis,
}

impl Entry {
    fn new(comparator: &Comparator, seq: usize, schedule: Schedule, analysis: Analysis) -> Self {
        Self {
            within: analysis.memory.peak_memory <= comparator.limit,
            time: analysis.memory.total_time,
            score: comparator.score(&analysis.memory),
            seq,
            schedule,
            analysis,
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = match (self.within, other.within) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => other.time.cmp(&self.time),
            (false, false) => other.score.total_cmp(&self.score),
        };
        // Earlier discoveries pop first among equals.
        rank.then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Result of one optimization run.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// The best schedule found (the origin if nothing beat it).
    pub best: Schedule,
    /// Analysis of the best schedule.
    pub analysis: Analysis,
    /// Schedules expanded before stopping.
    pub iterations: usize,
    /// Whether the budget was met within the runtime tolerance.
    pub satisfied: bool,
}

/// Best-first search driver.
#[derive(Clone, Copy, Debug)]
pub struct Optimizer {
    /// Device memory budget in bytes.
    pub limit: u64,
}

impl Optimizer {
    /// Creates an optimizer for the given budget.
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    /// Runs the search from `origin` until the budget is satisfied, the
    /// iteration cap is hit, or the queue drains.
    pub fn run(&self, common: &Common, origin: Schedule) -> Result<SearchOutcome, AnalysisError> {
        let origin_analysis = analyze(common, &origin)?;
        let origin_time = origin_analysis.memory.total_time;
        let comparator = Comparator {
            origin_time,
            limit: self.limit,
        };
        log::info!(
            "searching from origin: peak {}, total {}",
            pretty_bytes(origin_analysis.memory.peak_memory),
            pretty_duration(origin_time),
        );

        let mut seen: HashSet<u64> = HashSet::new();
        seen.insert(origin.structural_hash());

        let mut best_schedule = origin.fork();
        let mut best = origin_analysis.clone();

        let mut seq = 0usize;
        let mut heap = BinaryHeap::new();
        heap.push(Entry::new(&comparator, seq, origin, origin_analysis));

        let mut iterations = 0usize;
        while let Some(top) = heap.pop() {
            iterations += 1;

            if comparator.considerable(&top.analysis.memory, &best.memory) {
                let candidates = enumerate_occupies(
                    common,
                    &top.schedule,
                    &top.analysis,
                    iterations,
                    origin_time,
                );
                for candidate in &candidates {
                    let child = apply(&top.schedule, candidate);
                    if !seen.insert(child.structural_hash()) {
                        continue;
                    }
                    let analysis = analyze(common, &child)?;
                    if comparator.considerable(&analysis.memory, &best.memory) {
                        seq += 1;
                        heap.push(Entry::new(&comparator, seq, child.fork(), analysis.clone()));
                    }
                    if comparator.better(&analysis.memory, &best.memory) {
                        best_schedule = child;
                        best = analysis;
                    }
                }
            }

            if iterations % PROGRESS_PRINT_EVERY == 0 {
                log::info!(
                    "iteration {iterations}: best peak {}, best total {}, {} queued",
                    pretty_bytes(best.memory.peak_memory),
                    pretty_duration(best.memory.total_time),
                    heap.len(),
                );
            }
            if comparator.satisfy(&best.memory) {
                log::info!("budget satisfied after {iterations} iterations");
                break;
            }
            if iterations >= SEARCH_LIMIT {
                log::info!("iteration cap reached");
                break;
            }
        }

        let satisfied = comparator.satisfy(&best.memory);
        Ok(SearchOutcome {
            best: best_schedule,
            analysis: best,
            iterations,
            satisfied,
        })
    }
}
