//! Task records: one operator occurrence each.

use serde_json::Value;

use crate::arena::Handle;
use crate::operand::Operand;

/// Name of the structural marker that releases operands.
pub const DEALLOC: &str = ".dealloc";
/// Name of the structural marker that declares storage aliases.
pub const SHARE: &str = ".share";

/// Structural names that must not appear in input traces.
pub const FORBIDDEN: [&str; 4] = [".host2device", ".device2host", ".sync", ".alloc"];

/// One operator occurrence in a schedule.
///
/// Copies produced by re-materialization keep the occurrence `id` of
/// their original, so a schedule's task-id sequence is a structural
/// fingerprint of its rewrite history. All fields are frozen once the
/// task is built; forking a schedule is a plain clone.
#[derive(Clone, Debug)]
pub struct Task {
    /// Occurrence id, assigned at load and shared by re-materialized
    /// copies.
    pub id: u32,
    /// Operator name; names starting with `.` are structural markers.
    pub name: String,
    /// Scratch device memory the operator needs while executing.
    pub workspace: u64,
    /// Operands read by this task.
    pub ins: Vec<Handle<Operand>>,
    /// Operands written by this task.
    pub outs: Vec<Handle<Operand>>,
    /// Execution time in nanoseconds.
    pub duration: u64,
    /// `true` iff the task writes one of its own inputs.
    pub inplace: bool,
    /// Opaque payload from the trace, reinstated on output.
    pub attr: Value,
    /// Original trace ids of `ins`, before alias resolution.
    pub wire_ins: Vec<u64>,
    /// Original trace ids of `outs`, before alias resolution.
    pub wire_outs: Vec<u64>,
}

impl Task {
    /// Builds a compute task; `inplace` is derived from the slots.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        name: impl Into<String>,
        ins: Vec<Handle<Operand>>,
        outs: Vec<Handle<Operand>>,
        workspace: u64,
        duration: u64,
        attr: Value,
        wire_ins: Vec<u64>,
        wire_outs: Vec<u64>,
    ) -> Self {
        let inplace = outs.iter().any(|o| ins.contains(o));
        Self {
            id,
            name: name.into(),
            workspace,
            ins,
            outs,
            duration,
            inplace,
            attr,
            wire_ins,
            wire_outs,
        }
    }

    /// Builds a `.dealloc` marker releasing the given operands.
    pub fn dealloc(id: u32, operands: Vec<Handle<Operand>>, wire: Vec<u64>) -> Self {
        Self {
            id,
            name: DEALLOC.into(),
            workspace: 0,
            ins: Vec::new(),
            outs: operands,
            duration: 0,
            inplace: false,
            attr: Value::Null,
            wire_ins: Vec::new(),
            wire_outs: wire,
        }
    }

    /// Whether this task is a `.dealloc` marker.
    pub fn is_dealloc(&self) -> bool {
        self.name == DEALLOC
    }

    /// Whether this task is a `.share` marker.
    pub fn is_share(&self) -> bool {
        self.name == SHARE
    }

    /// Whether this task is any structural marker.
    pub fn is_marker(&self) -> bool {
        self.is_dealloc() || self.is_share()
    }

    /// Whether the name is one of the operators rejected on input.
    pub fn is_forbidden(&self) -> bool {
        FORBIDDEN.contains(&self.name.as_str())
    }
}
