//! The graph engine.
//!
//! A [`Graph`] owns every tensor and operator in arena slots addressed by
//! [`TensorId`] and [`OperatorId`]. All cross references (tensor source and
//! targets, operator predecessors and successors) are plain ids resolved
//! through the graph, so removing a node never leaves a dangling owner.
//!
//! Operator order is kept separately from the arena because topological
//! sorting permutes it; tensor order is slot order, which is insertion order.

mod builder;
mod planning;
mod topology;

use crate::allocator::Allocator;
use crate::error::{CoreError, Result};
use crate::operator::{OpKind, Operator};
use crate::runtime::Runtime;
use crate::tensor::Tensor;
use crate::types::{DataType, Fuid, OperatorId, Shape, TensorId};
use std::fmt;
use std::sync::Arc;

/// Tensors, operators and the allocator that will back them.
#[derive(Debug)]
pub struct Graph {
    tensors: Vec<Option<Tensor>>,
    operators: Vec<Option<Operator>>,
    order: Vec<OperatorId>,
    sorted: bool,
    allocator: Allocator,
}

impl Graph {
    /// Create an empty graph whose memory will come from `runtime`.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            tensors: Vec::new(),
            operators: Vec::new(),
            order: Vec::new(),
            sorted: false,
            allocator: Allocator::new(runtime),
        }
    }

    /// Create a fresh tensor owned by this graph.
    pub fn add_tensor(&mut self, shape: Shape, dtype: DataType) -> TensorId {
        self.insert_tensor(Tensor::new(shape, dtype))
    }

    /// Take ownership of a tensor built outside the graph.
    ///
    /// The tensor must not carry links; they only make sense inside the graph
    /// that created them.
    pub fn add_existing_tensor(&mut self, tensor: Tensor) -> Result<TensorId> {
        if tensor.is_linked() {
            return Err(CoreError::dangling(format!(
                "tensor {} carries links from another graph",
                tensor.guid()
            )));
        }
        Ok(self.insert_tensor(tensor))
    }

    fn insert_tensor(&mut self, tensor: Tensor) -> TensorId {
        let id = TensorId(self.tensors.len());
        self.tensors.push(Some(tensor));
        id
    }

    /// Tensor by id.
    pub fn tensor(&self, id: TensorId) -> Option<&Tensor> {
        self.tensors.get(id.0).and_then(Option::as_ref)
    }

    /// Operator by id.
    pub fn operator(&self, id: OperatorId) -> Option<&Operator> {
        self.operators.get(id.0).and_then(Option::as_ref)
    }

    /// Tensor whose functional id is `fuid`.
    pub fn tensor_by_fuid(&self, fuid: Fuid) -> Option<TensorId> {
        self.tensors().find(|(_, t)| t.fuid() == fuid).map(|(id, _)| id)
    }

    /// Live tensors in insertion order.
    pub fn tensors(&self) -> impl Iterator<Item = (TensorId, &Tensor)> {
        self.tensors
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|t| (TensorId(i), t)))
    }

    /// Live operators in current order (topological once sorted).
    pub fn operators(&self) -> impl Iterator<Item = (OperatorId, &Operator)> {
        self.order
            .iter()
            .filter_map(|&id| self.operator(id).map(|op| (id, op)))
    }

    /// Operator ids in current order.
    pub fn operator_ids(&self) -> &[OperatorId] {
        &self.order
    }

    /// Number of live tensors.
    pub fn num_tensors(&self) -> usize {
        self.tensors.iter().filter(|t| t.is_some()).count()
    }

    /// Number of live operators.
    pub fn num_operators(&self) -> usize {
        self.order.len()
    }

    /// Whether the cached operator order is known to be topological.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Allocator backing this graph's tensors.
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Mutable access to an operator's attributes.
    ///
    /// Edges are not touched; shapes downstream are refreshed by the next
    /// [`Graph::infer_shapes`].
    pub fn op_kind_mut(&mut self, id: OperatorId) -> Result<&mut OpKind> {
        Ok(self.operator_mut(id)?.kind_mut())
    }

    /// Overwrite a tensor's shape in place, keeping its identity.
    ///
    /// Typically used on graph inputs before [`Graph::infer_shapes`].
    pub fn set_tensor_shape(&mut self, id: TensorId, shape: Shape) -> Result<()> {
        self.tensor_mut(id)?.set_shape(shape);
        Ok(())
    }

    pub(crate) fn tensor_ref(&self, id: TensorId) -> Result<&Tensor> {
        self.tensor(id)
            .ok_or_else(|| CoreError::dangling(format!("tensor {id} is not in the graph")))
    }

    pub(crate) fn tensor_mut(&mut self, id: TensorId) -> Result<&mut Tensor> {
        self.tensors
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| CoreError::dangling(format!("tensor {id} is not in the graph")))
    }

    pub(crate) fn operator_ref(&self, id: OperatorId) -> Result<&Operator> {
        self.operator(id)
            .ok_or_else(|| CoreError::dangling(format!("operator {id} is not in the graph")))
    }

    pub(crate) fn operator_mut(&mut self, id: OperatorId) -> Result<&mut Operator> {
        self.operators
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| CoreError::dangling(format!("operator {id} is not in the graph")))
    }

    /// Register `op` and wire tensor and operator links in both directions.
    fn add_operator_and_connect(&mut self, op: Operator) -> Result<OperatorId> {
        let id = OperatorId(self.operators.len());
        let inputs = op.inputs().to_vec();
        let outputs = op.outputs().to_vec();
        self.operators.push(Some(op));
        self.order.push(id);
        self.sorted = false;

        for input in inputs {
            let tensor = self.tensor_mut(input)?;
            tensor.add_target(id);
            if let Some(pred) = tensor.source() {
                self.operator_mut(pred)?.add_successor(id);
                self.operator_mut(id)?.add_predecessor(pred);
            }
        }
        for output in outputs {
            let tensor = self.tensor_mut(output)?;
            tensor.set_source(Some(id));
            let targets = tensor.targets().to_vec();
            for succ in targets {
                self.operator_mut(succ)?.add_predecessor(id);
                self.operator_mut(id)?.add_successor(succ);
            }
        }
        Ok(id)
    }

    /// Point every use of `old` in `op`'s inputs at `new`, keeping tensor
    /// targets and operator adjacency consistent.
    pub fn replace_input(&mut self, op: OperatorId, old: TensorId, new: TensorId) -> Result<()> {
        self.tensor_ref(new)?;
        if !self.operator_mut(op)?.replace_input(old, new) {
            return Err(CoreError::dangling(format!(
                "{old} is not an input of operator {op}"
            )));
        }
        self.tensor_mut(old)?.remove_target(op);
        self.tensor_mut(new)?.add_target(op);
        self.refresh_predecessors(op)
    }

    /// Recompute `op`'s predecessors from its inputs and mirror the change
    /// into the affected successor lists.
    fn refresh_predecessors(&mut self, op: OperatorId) -> Result<()> {
        let mut preds = Vec::new();
        for &input in self.operator_ref(op)?.inputs() {
            if let Some(src) = self.tensor_ref(input)?.source() {
                if !preds.contains(&src) {
                    preds.push(src);
                }
            }
        }
        let old_preds = self.operator_ref(op)?.predecessors().to_vec();
        for &gone in old_preds.iter().filter(|p| !preds.contains(p)) {
            self.operator_mut(gone)?.remove_successor(op);
        }
        for &added in preds.iter().filter(|p| !old_preds.contains(p)) {
            self.operator_mut(added)?.add_successor(op);
        }
        self.operator_mut(op)?.set_predecessors(preds);
        Ok(())
    }

    /// Detach `op` from every neighbour and drop it from the graph.
    ///
    /// Its output tensors lose their source and its input tensors lose it as
    /// a target; the tensors themselves stay.
    pub fn remove_operator(&mut self, id: OperatorId) -> Result<Operator> {
        let op = self.operator_ref(id)?.clone();
        for &pred in op.predecessors() {
            self.operator_mut(pred)?.remove_successor(id);
        }
        for &succ in op.successors() {
            self.operator_mut(succ)?.remove_predecessor(id);
        }
        for &input in op.inputs() {
            self.tensor_mut(input)?.remove_target(id);
        }
        for &output in op.outputs() {
            let tensor = self.tensor_mut(output)?;
            if tensor.source() == Some(id) {
                tensor.set_source(None);
            }
        }
        self.order.retain(|&o| o != id);
        self.operators[id.0] = None;
        Ok(op)
    }

    /// Drop a tensor that no operator produces or consumes any more.
    pub fn remove_tensor(&mut self, id: TensorId) -> Result<Tensor> {
        if self.tensor_ref(id)?.is_linked() {
            return Err(CoreError::dangling(format!(
                "tensor {id} is still linked to operators"
            )));
        }
        self.tensors[id.0]
            .take()
            .ok_or_else(|| CoreError::dangling(format!("tensor {id} is not in the graph")))
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph Tensors:")?;
        for (_, tensor) in self.tensors() {
            writeln!(f, "{tensor}")?;
        }
        writeln!(f, "Graph operators:")?;
        for (id, op) in self.operators() {
            let guids = |ids: &[OperatorId]| -> Vec<u64> {
                ids.iter()
                    .filter_map(|&o| self.operator(o).map(Operator::guid))
                    .collect()
            };
            writeln!(
                f,
                "OP {} ({id}), pred {:?}, succ {:?}, {op}",
                op.guid(),
                guids(op.predecessors()),
                guids(op.successors())
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::UnaryKind;
    use crate::runtime::mock::MockRuntime;

    fn graph() -> Graph {
        Graph::new(Arc::new(MockRuntime::default()))
    }

    #[test]
    fn test_links_wired_on_insert() {
        let mut g = graph();
        let x = g.add_tensor(vec![2, 3], DataType::F32);
        let relu = g.unary(UnaryKind::Relu, x).unwrap();
        let y = g.operator(relu).unwrap().output().unwrap();
        let sig = g.unary(UnaryKind::Sigmoid, y).unwrap();

        assert_eq!(g.tensor(x).unwrap().targets(), &[relu]);
        assert_eq!(g.tensor(y).unwrap().source(), Some(relu));
        assert_eq!(g.operator(relu).unwrap().successors(), &[sig]);
        assert_eq!(g.operator(sig).unwrap().predecessors(), &[relu]);
        assert!(!g.is_sorted());
    }

    #[test]
    fn test_connect_consumer_added_before_producer() {
        let mut g = graph();
        let x = g.add_tensor(vec![4], DataType::F32);
        let y = g.add_tensor(vec![4], DataType::F32);
        let z = g.add_tensor(vec![4], DataType::F32);
        let consumer = g
            .add_op_with_outputs(OpKind::Unary(UnaryKind::Abs), &[y], &[z])
            .unwrap();
        let producer = g
            .add_op_with_outputs(OpKind::Unary(UnaryKind::Neg), &[x], &[y])
            .unwrap();
        assert_eq!(g.operator(producer).unwrap().successors(), &[consumer]);
        assert_eq!(g.operator(consumer).unwrap().predecessors(), &[producer]);
    }

    #[test]
    fn test_replace_input_updates_adjacency() {
        let mut g = graph();
        let a = g.add_tensor(vec![3], DataType::F32);
        let p1 = g.unary(UnaryKind::Relu, a).unwrap();
        let p2 = g.unary(UnaryKind::Exp, a).unwrap();
        let t1 = g.operator(p1).unwrap().output().unwrap();
        let t2 = g.operator(p2).unwrap().output().unwrap();
        let c = g.unary(UnaryKind::Tanh, t1).unwrap();

        g.replace_input(c, t1, t2).unwrap();
        assert_eq!(g.operator(c).unwrap().inputs(), &[t2]);
        assert_eq!(g.operator(c).unwrap().predecessors(), &[p2]);
        assert!(g.operator(p1).unwrap().successors().is_empty());
        assert_eq!(g.operator(p2).unwrap().successors(), &[c]);
        assert!(g.tensor(t1).unwrap().targets().is_empty());
        assert_eq!(g.tensor(t2).unwrap().targets(), &[c]);

        assert!(matches!(
            g.replace_input(c, t1, t2),
            Err(CoreError::DanglingReference(_))
        ));
    }

    #[test]
    fn test_remove_operator_and_tensors() {
        let mut g = graph();
        let x = g.add_tensor(vec![3], DataType::F32);
        let op = g.unary(UnaryKind::Relu, x).unwrap();
        let y = g.operator(op).unwrap().output().unwrap();

        assert!(matches!(g.remove_tensor(y), Err(CoreError::DanglingReference(_))));
        g.remove_operator(op).unwrap();
        assert_eq!(g.num_operators(), 0);
        assert!(!g.tensor(x).unwrap().is_linked());
        g.remove_tensor(y).unwrap();
        assert!(g.tensor(y).is_none());
        assert_eq!(g.num_tensors(), 1);
    }

    #[test]
    fn test_tensor_by_fuid() {
        let mut g = graph();
        let t = g.add_tensor(vec![1, 2], DataType::I8);
        let fuid = g.tensor(t).unwrap().fuid();
        assert_eq!(g.tensor_by_fuid(fuid), Some(t));
        assert_eq!(g.tensor_by_fuid(u64::MAX), None);
    }

    #[test]
    fn test_add_existing_rejects_linked() {
        let mut g = graph();
        let standalone = Tensor::new(vec![2], DataType::F32);
        assert!(g.add_existing_tensor(standalone).is_ok());

        let x = g.add_tensor(vec![2], DataType::F32);
        g.unary(UnaryKind::Relu, x).unwrap();
        let linked = g.tensor(x).unwrap().clone();
        assert!(matches!(
            g.add_existing_tensor(linked),
            Err(CoreError::DanglingReference(_))
        ));
    }

    #[test]
    fn test_display_lists_everything() {
        let mut g = graph();
        let x = g.add_tensor(vec![2, 3], DataType::F32);
        g.transpose(x, vec![1, 0]).unwrap();
        let text = g.to_string();
        assert!(text.starts_with("Graph Tensors:"));
        assert!(text.contains("Graph operators:"));
        assert!(text.contains("Transpose(perm=[1, 0])"));
    }
}
