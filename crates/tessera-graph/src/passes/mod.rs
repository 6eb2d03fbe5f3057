//! Rewrite passes.

mod transpose;

pub use transpose::TransposeRewritePass;

use serde::{Deserialize, Serialize};
use tessera_core::{Graph, Result};

/// A single rewrite over a graph.
pub trait OptimizationPass: Send + Sync {
    /// Pass name used in logs and statistics.
    fn name(&self) -> &str;

    /// Apply the pass in place.
    fn run(&self, graph: &mut Graph) -> Result<PassStats>;
}

/// What one pass run changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    /// Operators deleted outright.
    pub operators_removed: usize,
    /// Tensors deleted from the graph.
    pub tensors_removed: usize,
    /// Operators folded into a neighbour's attributes and deleted.
    pub operators_fused: usize,
}

impl PassStats {
    /// Operators that left the graph, removed or fused.
    pub fn total_changes(&self) -> usize {
        self.operators_removed + self.operators_fused
    }

    /// Accumulate another run's counters.
    pub fn merge(&mut self, other: &PassStats) {
        self.operators_removed += other.operators_removed;
        self.tensors_removed += other.tensors_removed;
        self.operators_fused += other.operators_fused;
    }
}

/// Safety switches for the transpose rewrites.
///
/// Both default to off, which applies the rewrites on adjacency alone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Only cancel a Transpose pair whose permutations compose to the identity.
    pub require_inverse_permutations: bool,
    /// Only fold a Transpose into a MatMul when it swaps exactly the last two axes.
    pub require_trailing_axes_swap: bool,
}

impl RewriteConfig {
    /// Both checks enabled.
    pub fn strict() -> Self {
        Self {
            require_inverse_permutations: true,
            require_trailing_axes_swap: true,
        }
    }
}
