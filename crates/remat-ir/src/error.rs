//! Error types for case loading.

/// Errors detected while reading an input trace.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The JSON document could not be parsed.
    #[error("malformed case file: {0}")]
    Json(#[from] serde_json::Error),

    /// Two operand records claim the same id.
    #[error("duplicate operand id {id} in data table")]
    DuplicateOperand { id: u64 },

    /// A task references an operand id with no record.
    #[error("task `{name}` (position {index}) references unknown operand id {id}")]
    UnknownOperand { name: String, index: usize, id: u64 },

    /// The trace contains an operator that must not appear in input.
    #[error("operator `{name}` is not allowed in input (position {index})")]
    ForbiddenTask { name: String, index: usize },

    /// A `.dealloc` marker carries inputs.
    #[error("`.dealloc` at position {index} must not have inputs")]
    MalformedDealloc { index: usize },

    /// A `.share` marker lacks one source or any aliases.
    #[error("`.share` at position {index} needs exactly one input and at least one output")]
    MalformedShare { index: usize },
}
