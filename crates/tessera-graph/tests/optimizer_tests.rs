//! Behaviour of the transpose rewrites through the optimizer.

mod common;

use anyhow::Result;
use common::{
    create_chain_graph, create_fusion_graph, create_layered_graph, create_pair_graph, graph,
    ChainStep,
};
use proptest::prelude::*;
use tessera_core::{CoreError, DataType, OpKind, OperatorId, TensorId, UnaryKind};
use tessera_graph::{
    GraphError, OptimizationLevel, OptimizationPass, Optimizer, RewriteConfig,
    TransposeRewritePass,
};

fn live_tensors(g: &tessera_core::Graph) -> Vec<TensorId> {
    g.tensors().map(|(id, _)| id).collect()
}

#[test]
fn test_transpose_matmul_fusion() -> Result<()> {
    let mut f = create_fusion_graph();
    let stats = Optimizer::new(OptimizationLevel::O1).optimize(&mut f.graph)?;

    assert!(f.graph.operator(f.transpose).is_none());
    let mm = f.graph.operator(f.matmul).unwrap();
    assert_eq!(
        mm.kind(),
        &OpKind::MatMul {
            trans_a: true,
            trans_b: false
        }
    );
    assert_eq!(mm.inputs(), &[f.x, f.b]);
    assert!(mm.predecessors().is_empty());
    assert_eq!(f.graph.tensor(f.x).unwrap().targets(), &[f.matmul]);
    assert_eq!(f.graph.num_tensors(), 3);

    let totals = stats.totals();
    assert_eq!(totals.operators_fused, 1);
    assert_eq!(totals.operators_removed, 0);
    assert_eq!(totals.tensors_removed, 1);

    // Shapes still agree after the rewrite.
    f.graph.infer_shapes()?;
    let out = f.graph.output_of(f.matmul)?;
    assert_eq!(f.graph.tensor(out).unwrap().shape(), &vec![3, 4]);
    f.graph.check_valid()?;
    Ok(())
}

#[test]
fn test_fusion_into_both_operands() -> Result<()> {
    let mut g = graph();
    let x = g.add_tensor(vec![3, 3], DataType::F32);
    let t = g.transpose(x, vec![1, 0])?;
    let xt = g.output_of(t)?;
    let mm = g.matmul(xt, xt, false, true)?;

    Optimizer::new(OptimizationLevel::O1).optimize(&mut g)?;
    let op = g.operator(mm).unwrap();
    assert_eq!(
        op.kind(),
        &OpKind::MatMul {
            trans_a: true,
            trans_b: false
        }
    );
    assert_eq!(op.inputs(), &[x, x]);
    Ok(())
}

#[test]
fn test_inverse_pair_eliminated() -> Result<()> {
    let (mut g, x, relu) = create_pair_graph(vec![2, 3, 4], vec![1, 2, 0], vec![2, 0, 1]);
    let stats = Optimizer::new(OptimizationLevel::O1).optimize(&mut g)?;

    assert_eq!(g.num_operators(), 1);
    assert_eq!(g.operator(relu).unwrap().inputs(), &[x]);
    assert!(g.operator(relu).unwrap().predecessors().is_empty());
    assert_eq!(g.tensor(x).unwrap().targets(), &[relu]);
    assert_eq!(g.num_tensors(), 2);
    assert_eq!(stats.totals().operators_removed, 2);
    assert_eq!(stats.totals().tensors_removed, 2);
    g.check_valid()?;
    Ok(())
}

#[test]
fn test_non_inverse_pair_follows_config() -> Result<()> {
    let (mut g, x, relu) = create_pair_graph(vec![2, 3, 4], vec![1, 2, 0], vec![1, 2, 0]);
    let strict = RewriteConfig {
        require_inverse_permutations: true,
        ..RewriteConfig::default()
    };
    let stats = Optimizer::with_config(OptimizationLevel::O1, strict).optimize(&mut g)?;
    assert_eq!(stats.total_changes(), 0);
    assert_eq!(g.num_operators(), 3);

    // Default switches cancel the pair on adjacency alone.
    Optimizer::new(OptimizationLevel::O1).optimize(&mut g)?;
    assert_eq!(g.num_operators(), 1);
    assert_eq!(g.operator(relu).unwrap().inputs(), &[x]);
    Ok(())
}

#[test]
fn test_pair_rewires_every_consumer() -> Result<()> {
    let mut g = graph();
    let x = g.add_tensor(vec![2, 3], DataType::F32);
    let t1 = g.transpose(x, vec![1, 0])?;
    let y = g.output_of(t1)?;
    let t2 = g.transpose(y, vec![1, 0])?;
    let z = g.output_of(t2)?;
    let a = g.unary(UnaryKind::Abs, z)?;
    let b = g.unary(UnaryKind::Exp, z)?;

    Optimizer::new(OptimizationLevel::O1).optimize(&mut g)?;
    assert_eq!(g.operator(a).unwrap().inputs(), &[x]);
    assert_eq!(g.operator(b).unwrap().inputs(), &[x]);
    assert_eq!(g.tensor(x).unwrap().targets(), &[a, b]);
    g.check_valid()?;
    Ok(())
}

#[test]
fn test_pair_feeding_graph_output_is_kept() -> Result<()> {
    let mut g = graph();
    let x = g.add_tensor(vec![2, 3], DataType::F32);
    let t1 = g.transpose(x, vec![1, 0])?;
    let y = g.output_of(t1)?;
    g.transpose(y, vec![1, 0])?;

    let stats = Optimizer::new(OptimizationLevel::O1).optimize(&mut g)?;
    assert_eq!(stats.total_changes(), 0);
    assert_eq!(g.num_operators(), 2);
    Ok(())
}

#[test]
fn test_shared_transpose_untouched() -> Result<()> {
    let mut f = create_fusion_graph();
    let xt = f.graph.output_of(f.transpose)?;
    f.graph.unary(UnaryKind::Relu, xt)?;

    let stats = Optimizer::new(OptimizationLevel::O1).optimize(&mut f.graph)?;
    assert_eq!(stats.total_changes(), 0);
    assert!(f.graph.operator(f.transpose).is_some());
    assert_eq!(
        f.graph.operator(f.matmul).unwrap().kind(),
        &OpKind::matmul()
    );
    Ok(())
}

#[test]
fn test_trailing_swap_switch() -> Result<()> {
    let build = || -> Result<_> {
        let mut g = graph();
        let x = g.add_tensor(vec![2, 2, 3], DataType::F32);
        let w = g.add_tensor(vec![2, 3, 5], DataType::F32);
        // Swaps the batch axis with the rows, which trans_a cannot express.
        let t = g.transpose(x, vec![1, 0, 2])?;
        let xt = g.output_of(t)?;
        let mm = g.matmul(xt, w, false, false)?;
        Ok((g, t, mm))
    };

    let (mut g, t, _) = build()?;
    Optimizer::with_config(OptimizationLevel::O1, RewriteConfig::strict()).optimize(&mut g)?;
    assert!(g.operator(t).is_some());
    g.infer_shapes()?;

    // Unchecked fusion folds it anyway and the shapes no longer line up.
    let (mut g, t, mm) = build()?;
    Optimizer::new(OptimizationLevel::O1).optimize(&mut g)?;
    assert!(g.operator(t).is_none());
    assert_eq!(
        g.operator(mm).unwrap().kind(),
        &OpKind::MatMul {
            trans_a: true,
            trans_b: false
        }
    );
    assert!(matches!(
        g.infer_shapes(),
        Err(CoreError::ShapeMismatch(_))
    ));
    Ok(())
}

#[test]
fn test_rewrite_is_idempotent() -> Result<()> {
    let mut g = create_layered_graph(4);
    let optimizer = Optimizer::new(OptimizationLevel::O1);
    let first = optimizer.optimize(&mut g)?;
    assert!(first.total_changes() > 0);

    let ops = g.operator_ids().to_vec();
    let tensors = live_tensors(&g);
    let second = optimizer.optimize(&mut g)?;
    assert_eq!(second.total_changes(), 0);
    assert_eq!(g.operator_ids(), ops.as_slice());
    assert_eq!(live_tensors(&g), tensors);
    g.check_valid()?;
    Ok(())
}

#[test]
fn test_layered_graph_reduces_to_matmuls() -> Result<()> {
    let mut g = create_layered_graph(3);
    assert_eq!(g.num_operators(), 13);
    let stats = Optimizer::new(OptimizationLevel::O1).optimize(&mut g)?;
    assert_eq!(g.num_operators(), 4);
    assert_eq!(g.operators().filter(|(_, op)| op.is_matmul()).count(), 3);
    assert!(g.operators().all(|(_, op)| !op.is_transpose()));
    assert_eq!(stats.totals().operators_fused, 3);
    g.infer_shapes()?;
    Ok(())
}

#[test]
fn test_o0_changes_nothing_but_sorts() -> Result<()> {
    let mut f = create_fusion_graph();
    let stats = Optimizer::new(OptimizationLevel::O0).optimize(&mut f.graph)?;
    assert_eq!(stats.total_changes(), 0);
    assert_eq!(stats.iterations, 0);
    assert!(f.graph.is_sorted());
    assert_eq!(f.graph.num_operators(), 2);
    Ok(())
}

#[test]
fn test_cycle_is_reported() {
    let mut g = graph();
    let p = g.add_tensor(vec![2, 2], DataType::F32);
    let q = g.add_tensor(vec![2, 2], DataType::F32);
    g.add_op_with_outputs(OpKind::transpose(vec![1, 0]), &[p], &[q])
        .unwrap();
    g.add_op_with_outputs(OpKind::transpose(vec![1, 0]), &[q], &[p])
        .unwrap();

    let err = Optimizer::new(OptimizationLevel::O1)
        .optimize(&mut g)
        .unwrap_err();
    assert_eq!(err, GraphError::Core(CoreError::CycleDetected(2)));
}

#[test]
fn test_pass_used_directly() -> Result<()> {
    let mut f = create_fusion_graph();
    let pass = TransposeRewritePass::default();
    assert_eq!(pass.name(), "TransposeRewrite");
    let stats = pass.run(&mut f.graph)?;
    assert_eq!(stats.operators_fused, 1);
    Ok(())
}

fn chain_step_strategy() -> impl Strategy<Value = ChainStep> {
    prop_oneof![
        3 => Just(ChainStep::Transpose),
        2 => any::<bool>().prop_map(ChainStep::MatMul),
        1 => Just(ChainStep::Relu),
    ]
}

fn snapshot(g: &tessera_core::Graph) -> Vec<(OperatorId, OpKind, Vec<TensorId>)> {
    g.operator_ids()
        .iter()
        .map(|&id| {
            let op = g.operator(id).unwrap();
            (id, op.kind().clone(), op.inputs().to_vec())
        })
        .collect()
}

proptest! {
    #[test]
    fn test_rewrite_reaches_fixed_point_on_chains(
        n in 1usize..6,
        steps in prop::collection::vec(chain_step_strategy(), 0..24),
    ) {
        let mut g = create_chain_graph(n, &steps);
        let optimizer = Optimizer::new(OptimizationLevel::O1);
        optimizer.optimize(&mut g).unwrap();
        g.check_valid().unwrap();
        g.infer_shapes().unwrap();

        let ops = snapshot(&g);
        let tensors = live_tensors(&g);
        let second = optimizer.optimize(&mut g).unwrap();
        prop_assert_eq!(second.total_changes(), 0);
        prop_assert_eq!(snapshot(&g), ops);
        prop_assert_eq!(live_tensors(&g), tensors);

        // Surviving transposes only feed operators neither rule applies to.
        for (id, op) in g.operators() {
            if !matches!(op.kind(), OpKind::Transpose { .. }) {
                continue;
            }
            for next in op.successors() {
                let kind = g.operator(*next).unwrap().kind();
                prop_assert!(
                    matches!(kind, OpKind::Unary(_)),
                    "transpose {} still feeds {}", id, kind
                );
            }
        }
    }
}
