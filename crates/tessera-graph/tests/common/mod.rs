// Common test utilities for tessera-graph tests

#![allow(dead_code)]

use std::sync::Arc;
use tessera_core::{DataType, Graph, OperatorId, TensorId};
use tessera_providers::CpuRuntime;

pub fn graph() -> Graph {
    Graph::new(Arc::new(CpuRuntime::new()))
}

/// Transpose([2,3] -> [3,2]) feeding MatMul operand A, with B [2,4].
pub struct FusionGraph {
    pub graph: Graph,
    pub x: TensorId,
    pub b: TensorId,
    pub transpose: OperatorId,
    pub matmul: OperatorId,
}

pub fn create_fusion_graph() -> FusionGraph {
    let mut graph = graph();
    let x = graph.add_tensor(vec![2, 3], DataType::F32);
    let b = graph.add_tensor(vec![2, 4], DataType::F32);
    let transpose = graph.transpose(x, vec![1, 0]).unwrap();
    let xt = graph.output_of(transpose).unwrap();
    let matmul = graph.matmul(xt, b, false, false).unwrap();
    FusionGraph {
        graph,
        x,
        b,
        transpose,
        matmul,
    }
}

/// x -> Transpose(p1) -> Transpose(p2) -> Relu
///
/// Returns the graph, x and the Relu.
pub fn create_pair_graph(
    shape: Vec<usize>,
    p1: Vec<usize>,
    p2: Vec<usize>,
) -> (Graph, TensorId, OperatorId) {
    let mut graph = graph();
    let x = graph.add_tensor(shape, DataType::F32);
    let t1 = graph.transpose(x, p1).unwrap();
    let y = graph.output_of(t1).unwrap();
    let t2 = graph.transpose(y, p2).unwrap();
    let z = graph.output_of(t2).unwrap();
    let relu = graph.unary(tessera_core::UnaryKind::Relu, z).unwrap();
    (graph, x, relu)
}

/// `layers` blocks of x -> Transpose -> MatMul(w) -> Transpose -> Transpose,
/// closed by a Relu.
pub fn create_layered_graph(layers: usize) -> Graph {
    let mut graph = graph();
    let mut x = graph.add_tensor(vec![16, 16], DataType::F32);
    for _ in 0..layers {
        let w = graph.add_tensor(vec![16, 16], DataType::F32);
        let t = graph.transpose(x, vec![1, 0]).unwrap();
        let xt = graph.output_of(t).unwrap();
        let mm = graph.matmul(xt, w, false, false).unwrap();
        let y = graph.output_of(mm).unwrap();
        let t1 = graph.transpose(y, vec![1, 0]).unwrap();
        let y1 = graph.output_of(t1).unwrap();
        let t2 = graph.transpose(y1, vec![1, 0]).unwrap();
        x = graph.output_of(t2).unwrap();
    }
    graph.unary(tessera_core::UnaryKind::Relu, x).unwrap();
    graph
}

/// One link of a square `[n, n]` chain built by [`create_chain_graph`].
#[derive(Debug, Clone, Copy)]
pub enum ChainStep {
    Transpose,
    /// MatMul with a fresh weight; `true` puts the chain value in operand A.
    MatMul(bool),
    Relu,
}

/// A single chain of `steps` over `[n, n]` tensors, closed by a Relu.
pub fn create_chain_graph(n: usize, steps: &[ChainStep]) -> Graph {
    let mut graph = graph();
    let mut x = graph.add_tensor(vec![n, n], DataType::F32);
    for step in steps {
        let op = match *step {
            ChainStep::Transpose => graph.transpose(x, vec![1, 0]).unwrap(),
            ChainStep::MatMul(chain_is_a) => {
                let w = graph.add_tensor(vec![n, n], DataType::F32);
                if chain_is_a {
                    graph.matmul(x, w, false, false).unwrap()
                } else {
                    graph.matmul(w, x, false, false).unwrap()
                }
            }
            ChainStep::Relu => graph.unary(tessera_core::UnaryKind::Relu, x).unwrap(),
        };
        x = graph.output_of(op).unwrap();
    }
    graph.unary(tessera_core::UnaryKind::Relu, x).unwrap();
    graph
}
