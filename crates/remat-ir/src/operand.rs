//! Operand descriptors.

use serde_json::{Map, Value};

/// An intermediate tensor flowing through the schedule.
///
/// The descriptor is frozen for the lifetime of a run: `id` and `size`
/// never change, and every hash in the system is derived from `id` so
/// results are reproducible across processes. Liveness and other
/// per-analysis state live in the analysis results, never here.
#[derive(Clone, Debug)]
pub struct Operand {
    /// Stable identity assigned by the upstream trace.
    pub id: u64,
    /// Size in bytes.
    pub size: u64,
    /// Opaque attribute fields from the trace, preserved for output.
    pub attrs: Map<String, Value>,
}

impl Operand {
    /// Creates a descriptor with no extra attributes.
    pub fn new(id: u64, size: u64) -> Self {
        Self {
            id,
            size,
            attrs: Map::new(),
        }
    }

    /// The version an operand carries before any in-stream producer
    /// writes it.
    pub fn initial_version(&self) -> u64 {
        self.id
    }
}
