//! Error types for graph planning and arena allocation.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the graph engine, shape inference and the allocator.
///
/// Every condition that would abort a planning pass is reported through one
/// of these variants; a pass that returns an error leaves no partial result
/// the caller should keep using.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The operator dependency relation contains a cycle.
    #[error("graph contains a cycle: {0} operator(s) could not be ordered")]
    CycleDetected(usize),

    /// Two shapes that must agree do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A tensor has the wrong number of dimensions for its use.
    #[error("rank mismatch: expected {expected}, got {actual}")]
    RankMismatch {
        /// Rank required by the operator.
        expected: String,
        /// Rank that was supplied.
        actual: usize,
    },

    /// An axis index falls outside `[-rank, rank)`.
    #[error("axis {axis} out of range for rank {rank}")]
    AxisOutOfRange {
        /// Axis as supplied by the caller.
        axis: i64,
        /// Rank of the tensor the axis refers to.
        rank: usize,
    },

    /// The requested cast has no entry in the cast table.
    #[error("unsupported cast: {0}")]
    UnsupportedCast(String),

    /// A link points at a tensor or operator the graph does not own.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// Two tensors share a functional id.
    #[error("duplicate functional id {0}")]
    DuplicateIdentity(u64),

    /// The allocator was used in a way its contract forbids.
    #[error("allocator misuse: {0}")]
    AllocatorMisuse(String),

    /// An operator received the wrong number of inputs.
    #[error("{op} expects {expected} input(s), got {actual}")]
    ArityMismatch {
        /// Operator kind name.
        op: &'static str,
        /// Accepted input count.
        expected: String,
        /// Supplied input count.
        actual: usize,
    },

    /// The backing runtime could not provide memory.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::ShapeMismatch`].
    pub fn shape(message: impl Into<String>) -> Self {
        CoreError::ShapeMismatch(message.into())
    }

    /// Shorthand for [`CoreError::DanglingReference`].
    pub fn dangling(message: impl Into<String>) -> Self {
        CoreError::DanglingReference(message.into())
    }

    /// Shorthand for [`CoreError::AllocatorMisuse`].
    pub fn misuse(message: impl Into<String>) -> Self {
        CoreError::AllocatorMisuse(message.into())
    }
}
