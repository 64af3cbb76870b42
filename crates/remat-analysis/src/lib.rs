//! Dataflow, liveness, and memory analyses over remat schedules.
//!
//! A freshly loaded schedule still carries `.dealloc` and `.share`
//! markers. [`canonicalize`] resolves both into the immutable [`Common`]
//! context and a pure compute stream; [`analyze`] then derives, for any
//! schedule over that context, the per-usage dataflow links and the
//! straight-line memory profile the optimizer works with. All analysis
//! state is keyed by task index and rebuilt from scratch on every call,
//! so schedules themselves stay plain data.

pub mod memory;
pub mod placement;
pub mod restore;
pub mod share;
pub mod topology;

pub use memory::{simulate_memory, MemoryProfile};
pub use placement::{analyze_placement, strip_markers, Placement};
pub use restore::{check_restored, restore_deallocs};
pub use share::{resolve_shares, ShareMap};
pub use topology::{analyze_topology, Port, TaskLinks, Topology, UsageLinks, UsageRef};

use remat_ir::{Arena, Common, Operand, Schedule};

/// Errors raised by analyses.
///
/// Structural problems in the input (`.share` misuse, reads of released
/// operands) and violations of internal invariants (a rewrite producing
/// an inconsistent stream) both land here; neither is recoverable for
/// the affected case.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A task reads an operand that is not resident at that point.
    #[error("input operand {operand} of task `{name}` (position {index}) is not resident")]
    InputNotLive {
        /// Task name.
        name: String,
        /// Position in the stream.
        index: usize,
        /// Trace id of the operand.
        operand: u64,
    },

    /// An operand is released while not resident.
    #[error("releasing operand {operand} at position {index}, but it is not resident")]
    DeallocNotLive {
        /// Position in the stream.
        index: usize,
        /// Trace id of the operand.
        operand: u64,
    },

    /// A `.share` source was itself introduced as an alias earlier.
    #[error("`.share` at position {index} uses aliased operand {operand} as its source")]
    ShareSourceAliased {
        /// Position in the stream.
        index: usize,
        /// Trace id of the operand.
        operand: u64,
    },

    /// An operand appears as a `.share` output twice.
    #[error("operand {operand} aliased twice (second time at position {index})")]
    ShareAliasReused {
        /// Position in the stream.
        index: usize,
        /// Trace id of the operand.
        operand: u64,
    },

    /// After replaying a restored stream, an operand is still resident
    /// that should have been released.
    #[error("restored schedule leaks operand {operand} at exit")]
    ExitOperandLeaked {
        /// Trace id of the operand.
        operand: u64,
    },

    /// After replaying a restored stream, an operand that must survive
    /// the schedule is gone.
    #[error("restored schedule released operand {operand}, which must stay resident")]
    ExitOperandMissing {
        /// Trace id of the operand.
        operand: u64,
    },
}

/// Result of a full schedule analysis.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// Per-usage dataflow links and release points.
    pub topology: Topology,
    /// Straight-line memory and time profile.
    pub memory: MemoryProfile,
}

/// Runs topology construction and memory simulation on a canonical
/// (marker-free) schedule.
pub fn analyze(common: &Common, schedule: &Schedule) -> Result<Analysis, AnalysisError> {
    let topology = analyze_topology(common, schedule);
    let memory = simulate_memory(common, schedule, &topology)?;
    Ok(Analysis { topology, memory })
}

/// Canonicalizes a freshly loaded case.
///
/// Runs placement over the marker-bearing stream, resolves `.share`
/// aliasing, rewrites the boundary sets to canonical operands, and
/// strips all markers. The returned [`Common`] is immutable for the
/// rest of the run.
pub fn canonicalize(
    operands: Arena<Operand>,
    mut schedule: Schedule,
) -> Result<(Common, Schedule), AnalysisError> {
    let placement = analyze_placement(&operands, &schedule)?;
    let shares = resolve_shares(&operands, &mut schedule)?;
    strip_markers(&mut schedule);

    let common = Common {
        operands,
        already_on: placement
            .already_on
            .iter()
            .map(|&h| shares.canonical(h))
            .collect(),
        not_dealloc: placement
            .not_dealloc
            .iter()
            .map(|&h| shares.canonical(h))
            .collect(),
    };
    log::debug!(
        "canonicalized case: {} tasks, {} resident at entry, {} resident at exit, {} aliases",
        schedule.len(),
        common.already_on.len(),
        common.not_dealloc.len(),
        shares.alias_count(),
    );
    Ok((common, schedule))
}
