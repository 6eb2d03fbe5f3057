// High-level API for the tessera planner
//
// Wraps graph validation, rewrites, shape inference and memory planning in a
// single session call.

pub mod error;
mod session;

pub use error::{Error, Result};
pub use session::{PlanSummary, PlanningSession, SessionOptions};

// Re-export commonly used types
pub use tessera_core::logging::{LogLevel, LoggingConfig};
pub use tessera_core::{DataType, Graph, MemoryReport, OpKind, TensorId, UnaryKind};
pub use tessera_graph::{OptimizationLevel, OptimizationStats, RewriteConfig};
pub use tessera_providers::CpuRuntime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{PlanningSession, SessionOptions};
    pub use tessera_core::{DataType, Graph, UnaryKind};
    pub use tessera_graph::OptimizationLevel;
}
