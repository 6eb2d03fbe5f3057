//! Graph rewrites for the tessera planner.
//!
//! Passes implement [`OptimizationPass`] and are driven by an [`Optimizer`]
//! configured with an [`OptimizationLevel`]:
//!
//! - `O0`: no rewrites
//! - `O1`: Transpose pair elimination and Transpose to MatMul fusion
//!
//! ```rust,ignore
//! use tessera_graph::{OptimizationLevel, Optimizer};
//!
//! let stats = Optimizer::new(OptimizationLevel::O1).optimize(&mut graph)?;
//! println!("{} changes", stats.total_changes());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod passes;

pub use error::{GraphError, Result};
pub use passes::{OptimizationPass, PassStats, RewriteConfig, TransposeRewritePass};

use serde::{Deserialize, Serialize};
use tessera_core::Graph;
use tracing::{debug, info};

/// How aggressively to rewrite.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizationLevel {
    /// Leave the graph as built.
    O0,
    /// Transpose rewrites.
    #[default]
    O1,
}

/// Statistics for one [`Optimizer::optimize`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationStats {
    /// Per-pass counters, in the order the passes ran.
    pub passes: Vec<(String, PassStats)>,
    /// Number of scans over the pass pipeline.
    pub iterations: usize,
}

impl OptimizationStats {
    /// Operators removed or fused across all passes.
    pub fn total_changes(&self) -> usize {
        self.passes.iter().map(|(_, s)| s.total_changes()).sum()
    }

    /// Counters summed over all passes.
    pub fn totals(&self) -> PassStats {
        let mut total = PassStats::default();
        for (_, stats) in &self.passes {
            total.merge(stats);
        }
        total
    }
}

/// Runs the passes selected by an [`OptimizationLevel`].
pub struct Optimizer {
    level: OptimizationLevel,
    passes: Vec<Box<dyn OptimizationPass>>,
}

impl Optimizer {
    /// Optimizer with the default rewrite switches.
    pub fn new(level: OptimizationLevel) -> Self {
        Self::with_config(level, RewriteConfig::default())
    }

    /// Optimizer whose transpose rewrites use `config`.
    pub fn with_config(level: OptimizationLevel, config: RewriteConfig) -> Self {
        let passes: Vec<Box<dyn OptimizationPass>> = match level {
            OptimizationLevel::O0 => Vec::new(),
            OptimizationLevel::O1 => vec![Box::new(TransposeRewritePass::new(config))],
        };
        Self { level, passes }
    }

    /// Append a custom pass after the built-in ones.
    pub fn add_pass(&mut self, pass: Box<dyn OptimizationPass>) {
        self.passes.push(pass);
    }

    /// Configured level.
    pub fn level(&self) -> OptimizationLevel {
        self.level
    }

    /// Names of the passes that will run.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Sort the graph, then run every pass once in order.
    ///
    /// A cycle is reported before any pass runs. A pass failure leaves the
    /// graph partially rewritten.
    pub fn optimize(&self, graph: &mut Graph) -> Result<OptimizationStats> {
        graph.ensure_sorted()?;
        let mut stats = OptimizationStats::default();
        if self.passes.is_empty() {
            debug!(level = ?self.level, "no passes configured");
            return Ok(stats);
        }

        for pass in &self.passes {
            let pass_stats = pass.run(graph).map_err(|source| GraphError::PassFailed {
                pass: pass.name().to_string(),
                source,
            })?;
            debug!(pass = pass.name(), ?pass_stats, "pass finished");
            stats.passes.push((pass.name().to_string(), pass_stats));
        }
        stats.iterations = 1;

        info!(
            "Optimization completed: {} changes in {} iterations",
            stats.total_changes(),
            stats.iterations
        );
        Ok(stats)
    }
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("level", &self.level)
            .field("passes", &self.pass_names())
            .finish()
    }
}
