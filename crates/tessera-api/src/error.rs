use tessera_core::CoreError;
use tessera_graph::GraphError;
use thiserror::Error;

/// Result type for planning sessions.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a [`PlanningSession`](crate::PlanningSession).
#[derive(Error, Debug)]
pub enum Error {
    /// Graph engine, inference or allocator failure.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Rewrite pass failure.
    #[error("Optimization error: {0}")]
    Optimization(#[from] GraphError),

    /// Invalid session options document.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
