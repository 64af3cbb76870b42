//! Re-materialization search for remat schedules.
//!
//! Given a canonical schedule whose peak footprint exceeds a device
//! budget, the optimizer enumerates producer/consumer pairs that span
//! the peak ([`occupy`]), rewrites the stream to re-execute the
//! producer just before its first post-peak consumer ([`rewrite`]), and
//! drives a best-first search over rewritten schedules ([`search`]).

pub mod occupy;
pub mod rewrite;
pub mod search;

pub use occupy::{enumerate_occupies, Occupy};
pub use rewrite::apply;
pub use search::{Comparator, Optimizer, SearchOutcome};

/// Iteration cap of the best-first search.
pub const SEARCH_LIMIT: usize = 1500;

/// Progress is logged every this many iterations.
pub const PROGRESS_PRINT_EVERY: usize = 300;

/// Longest chain of ancestor re-executions a candidate may carry.
pub const MAX_REGEN_CHAIN: usize = 3;

/// Candidates kept per scoring scheme each round.
pub const CANDIDATES_PER_SCHEME: usize = 2;

/// A random extra candidate is admitted every this many rounds.
pub const ROUNDS_PER_RANDOM_PICK: usize = 1;

/// A schedule is worth revisiting while its score stays within this
/// ratio of the incumbent's.
pub const RECONSIDER_RATIO: f64 = 1.2;

/// Accepted runtime inflation over the origin schedule.
pub const TIME_TOLERANCE: f64 = 1.01;

/// Weight of the memory term in the search comparator.
pub const MEMORY_FACTOR: f64 = 0.6;

/// Weight of the time term in the search comparator.
pub const TIME_FACTOR: f64 = 0.4;

/// Candidate weights favoring low runtime cost: (memory, time).
pub const TIME_HEAVY_WEIGHTS: (f64, f64) = (0.2, 0.8);

/// Candidate weights favoring large memory relief: (memory, time).
pub const MEMORY_HEAVY_WEIGHTS: (f64, f64) = (0.8, 0.2);
