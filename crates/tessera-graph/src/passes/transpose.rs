use super::{OptimizationPass, PassStats, RewriteConfig};
use tessera_core::{Graph, OpKind, OperatorId, Result, TensorId};
use tracing::{debug, warn};

/// Removes Transpose operators that can be absorbed by their consumer.
///
/// Two rules, applied at every Transpose whose output has exactly one
/// consumer during a single scan of the sorted operators:
///
/// - Transpose followed by Transpose: both operators and both intermediate
///   tensors go away and the consumers of the second output read the first
///   input directly.
/// - Transpose followed by MatMul: the MatMul's `trans_a`/`trans_b` flag is
///   toggled for every operand slot fed by the Transpose, which is then
///   bypassed and removed.
#[derive(Debug, Default, Clone)]
pub struct TransposeRewritePass {
    config: RewriteConfig,
}

enum Rewrite {
    Skipped,
    PairEliminated,
    FusedIntoMatMul,
}

impl OptimizationPass for TransposeRewritePass {
    fn name(&self) -> &str {
        "TransposeRewrite"
    }

    fn run(&self, graph: &mut Graph) -> Result<PassStats> {
        graph.ensure_sorted()?;
        let mut stats = PassStats::default();

        // Removals shift later operators down, so the index only advances
        // when nothing was rewritten at it.
        let mut i = 0;
        while let Some(&id) = graph.operator_ids().get(i) {
            match self.rewrite_at(graph, id)? {
                Rewrite::Skipped => i += 1,
                Rewrite::PairEliminated => {
                    stats.operators_removed += 2;
                    stats.tensors_removed += 2;
                }
                Rewrite::FusedIntoMatMul => {
                    stats.tensors_removed += 1;
                    stats.operators_fused += 1;
                }
            }
        }

        debug!(
            "Transpose rewrite completed: {} operators removed, {} fused",
            stats.operators_removed, stats.operators_fused
        );
        Ok(stats)
    }
}

impl TransposeRewritePass {
    /// Pass with the given safety switches.
    pub fn new(config: RewriteConfig) -> Self {
        Self { config }
    }

    /// Active safety switches.
    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    fn rewrite_at(&self, graph: &mut Graph, id: OperatorId) -> Result<Rewrite> {
        let Some(op) = graph.operator(id) else {
            return Ok(Rewrite::Skipped);
        };
        let OpKind::Transpose { permutation } = op.kind() else {
            return Ok(Rewrite::Skipped);
        };
        let (Some(&input), Some(output)) = (op.inputs().first(), op.output()) else {
            return Ok(Rewrite::Skipped);
        };
        let consumers = graph.tensor(output).map(|t| t.targets()).unwrap_or_default();
        let &[next] = consumers else {
            return Ok(Rewrite::Skipped);
        };
        let Some(next_op) = graph.operator(next) else {
            return Ok(Rewrite::Skipped);
        };

        match next_op.kind() {
            OpKind::Transpose {
                permutation: second,
            } => {
                let inverse = composes_to_identity(permutation, second);
                if !inverse && self.config.require_inverse_permutations {
                    return Ok(Rewrite::Skipped);
                }
                let Some(pair_output) = next_op.output() else {
                    return Ok(Rewrite::Skipped);
                };
                if !inverse {
                    warn!(
                        first = ?permutation,
                        second = ?second,
                        "cancelling transpose pair that does not compose to the identity"
                    );
                }
                self.eliminate_pair(graph, id, next, input, output, pair_output)
            }
            OpKind::MatMul { .. } => {
                if self.config.require_trailing_axes_swap && !swaps_trailing_axes(permutation) {
                    return Ok(Rewrite::Skipped);
                }
                self.fuse_into_matmul(graph, id, next, input, output)
            }
            _ => Ok(Rewrite::Skipped),
        }
    }

    fn eliminate_pair(
        &self,
        graph: &mut Graph,
        first: OperatorId,
        second: OperatorId,
        input: TensorId,
        middle: TensorId,
        output: TensorId,
    ) -> Result<Rewrite> {
        let consumers = graph
            .tensor(output)
            .map(|t| t.targets().to_vec())
            .unwrap_or_default();
        // The pair's output is a graph output; nothing to rewire it to.
        if consumers.is_empty() {
            return Ok(Rewrite::Skipped);
        }

        for consumer in consumers {
            graph.replace_input(consumer, output, input)?;
        }
        graph.remove_operator(first)?;
        graph.remove_operator(second)?;
        graph.remove_tensor(middle)?;
        graph.remove_tensor(output)?;

        debug!(%first, %second, %input, "transpose pair eliminated");
        Ok(Rewrite::PairEliminated)
    }

    fn fuse_into_matmul(
        &self,
        graph: &mut Graph,
        transpose: OperatorId,
        matmul: OperatorId,
        input: TensorId,
        output: TensorId,
    ) -> Result<Rewrite> {
        let operands = graph
            .operator(matmul)
            .map(|op| op.inputs().to_vec())
            .unwrap_or_default();
        let feeds_a = operands.first() == Some(&output);
        let feeds_b = operands.get(1) == Some(&output);

        if let OpKind::MatMul { trans_a, trans_b } = graph.op_kind_mut(matmul)? {
            if feeds_a {
                *trans_a = !*trans_a;
            }
            if feeds_b {
                *trans_b = !*trans_b;
            }
        }
        graph.replace_input(matmul, output, input)?;
        graph.remove_operator(transpose)?;
        graph.remove_tensor(output)?;

        debug!(%transpose, %matmul, feeds_a, feeds_b, "transpose fused into matmul");
        Ok(Rewrite::FusedIntoMatMul)
    }
}

/// Whether applying `first` then `second` leaves every axis in place.
fn composes_to_identity(first: &[usize], second: &[usize]) -> bool {
    first.len() == second.len()
        && second
            .iter()
            .enumerate()
            .all(|(axis, &p)| first.get(p) == Some(&axis))
}

/// Whether `permutation` is the identity except for swapping the last two axes.
fn swaps_trailing_axes(permutation: &[usize]) -> bool {
    let rank = permutation.len();
    if rank < 2 {
        return false;
    }
    permutation[..rank - 2]
        .iter()
        .enumerate()
        .all(|(axis, &p)| p == axis)
        && permutation[rank - 2] == rank - 1
        && permutation[rank - 1] == rank - 2
}
