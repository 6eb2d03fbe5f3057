//! Error types for the tessera-graph crate.

use tessera_core::CoreError;
use thiserror::Error;

/// Result type for rewrite passes.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while optimizing a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A graph primitive failed outside any pass (sorting, lookups).
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// A pass failed part way through; the graph must be discarded.
    #[error("Pass {pass} failed: {source}")]
    PassFailed {
        /// Name of the failing pass.
        pass: String,
        /// Underlying graph error.
        source: CoreError,
    },
}

impl GraphError {
    /// The core error behind this failure.
    pub fn core(&self) -> &CoreError {
        match self {
            GraphError::Core(err) => err,
            GraphError::PassFailed { source, .. } => source,
        }
    }
}
