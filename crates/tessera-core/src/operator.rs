//! Computation nodes and their kind-specific attributes.

use crate::error::{CoreError, Result};
use crate::ops::{self, UnaryKind};
use crate::tensor::Tensor;
use crate::types::{next_guid, CastType, DataType, Guid, OperatorId, Shape, TensorId};
use std::fmt;

/// Operator kinds understood by the planner, with their attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    /// Batched matrix multiplication with optional operand transposes.
    MatMul {
        /// Swap the trailing two dimensions of operand A.
        trans_a: bool,
        /// Swap the trailing two dimensions of operand B.
        trans_b: bool,
    },
    /// Axis permutation; empty means identity until the operator is added.
    Transpose {
        /// Output dimension `i` reads input dimension `permutation[i]`.
        permutation: Vec<usize>,
    },
    /// Concatenation along a normalized axis.
    Concat {
        /// Axis in `0..rank`.
        axis: usize,
    },
    /// Element-wise activation.
    Unary(UnaryKind),
    /// Clamp to optional scalar bounds.
    Clip {
        /// Lower bound.
        min: Option<f32>,
        /// Upper bound.
        max: Option<f32>,
    },
    /// Element type conversion.
    Cast(CastType),
}

impl OpKind {
    /// Plain matrix multiplication.
    pub fn matmul() -> Self {
        OpKind::MatMul {
            trans_a: false,
            trans_b: false,
        }
    }

    /// Transpose with the given permutation (empty for identity).
    pub fn transpose(permutation: Vec<usize>) -> Self {
        OpKind::Transpose { permutation }
    }

    /// Kind name used in logs and rendering.
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::MatMul { .. } => "MatMul",
            OpKind::Transpose { .. } => "Transpose",
            OpKind::Concat { .. } => "Concat",
            OpKind::Unary(_) => "Unary",
            OpKind::Clip { .. } => "Clip",
            OpKind::Cast(_) => "Cast",
        }
    }

    /// Check the number of inputs this kind accepts.
    pub fn check_arity(&self, actual: usize) -> Result<()> {
        let (ok, expected) = match self {
            OpKind::MatMul { .. } => (actual == 2, "2"),
            OpKind::Transpose { .. } | OpKind::Unary(_) | OpKind::Cast(_) => (actual == 1, "1"),
            OpKind::Clip { .. } => ((1..=3).contains(&actual), "1..=3"),
            OpKind::Concat { .. } => (actual >= 1, ">= 1"),
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::ArityMismatch {
                op: self.name(),
                expected: expected.to_string(),
                actual,
            })
        }
    }

    /// Fill in attributes that depend on the inputs (identity permutation)
    /// and validate the ones that were supplied.
    pub(crate) fn resolve(self, inputs: &[&Tensor]) -> Result<Self> {
        self.check_arity(inputs.len())?;
        match self {
            OpKind::Transpose { permutation } => Ok(OpKind::Transpose {
                permutation: ops::normalize_permutation(permutation, inputs[0].rank())?,
            }),
            other => Ok(other),
        }
    }

    /// Output shapes for the given inputs.
    pub fn infer_shape(&self, inputs: &[&Tensor]) -> Result<Vec<Shape>> {
        self.check_arity(inputs.len())?;
        let shapes: Vec<&[usize]> = inputs.iter().map(|t| t.shape().as_slice()).collect();
        let shape = match self {
            OpKind::MatMul { trans_a, trans_b } => {
                ops::matmul_shape(shapes[0], shapes[1], *trans_a, *trans_b)?
            }
            OpKind::Transpose { permutation } => ops::transpose_shape(shapes[0], permutation)?,
            OpKind::Concat { axis } => ops::concat_shape(&shapes, *axis)?,
            OpKind::Unary(_) | OpKind::Clip { .. } | OpKind::Cast(_) => {
                ops::elementwise_shape(&shapes)?
            }
        };
        Ok(vec![shape])
    }

    /// Output element types for the given inputs.
    pub fn infer_data_type(&self, inputs: &[&Tensor]) -> Result<Vec<DataType>> {
        self.check_arity(inputs.len())?;
        let dtype = match self {
            OpKind::Cast(cast) => ops::cast_data_type(*cast, inputs[0].dtype())?,
            _ => inputs[0].dtype(),
        };
        Ok(vec![dtype])
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::MatMul { trans_a, trans_b } => write!(
                f,
                "MatMul([{},{}])",
                if *trans_a { "A^T" } else { "A" },
                if *trans_b { "B^T" } else { "B" }
            ),
            OpKind::Transpose { permutation } => write!(f, "Transpose(perm={permutation:?})"),
            OpKind::Concat { axis } => write!(f, "Concat(dim={axis})"),
            OpKind::Unary(kind) => write!(f, "{kind}"),
            OpKind::Clip { min, max } => write!(f, "Clip(min={min:?},max={max:?})"),
            OpKind::Cast(cast) => write!(f, "Cast({cast})"),
        }
    }
}

/// An operator node: kind, tensor edges and derived operator adjacency.
///
/// `predecessors` and `successors` are derived from the tensor links and are
/// only ever updated by the owning graph.
#[derive(Debug, Clone)]
pub struct Operator {
    guid: Guid,
    kind: OpKind,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
    predecessors: Vec<OperatorId>,
    successors: Vec<OperatorId>,
}

impl Operator {
    pub(crate) fn new(kind: OpKind, inputs: Vec<TensorId>, outputs: Vec<TensorId>) -> Self {
        Self {
            guid: next_guid(),
            kind,
            inputs,
            outputs,
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    /// Unique id of this object.
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// Kind and attributes.
    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    /// Input tensors in operand order.
    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    /// Output tensors.
    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }

    /// Single output tensor; every supported kind has exactly one.
    pub fn output(&self) -> Option<TensorId> {
        self.outputs.first().copied()
    }

    /// Operators producing this operator's inputs.
    pub fn predecessors(&self) -> &[OperatorId] {
        &self.predecessors
    }

    /// Operators consuming this operator's outputs.
    pub fn successors(&self) -> &[OperatorId] {
        &self.successors
    }

    /// Whether this is a transpose.
    pub fn is_transpose(&self) -> bool {
        matches!(self.kind, OpKind::Transpose { .. })
    }

    /// Whether this is a matrix multiplication.
    pub fn is_matmul(&self) -> bool {
        matches!(self.kind, OpKind::MatMul { .. })
    }

    pub(crate) fn kind_mut(&mut self) -> &mut OpKind {
        &mut self.kind
    }

    pub(crate) fn replace_input(&mut self, old: TensorId, new: TensorId) -> bool {
        let mut replaced = false;
        for input in self.inputs.iter_mut().filter(|t| **t == old) {
            *input = new;
            replaced = true;
        }
        replaced
    }

    pub(crate) fn set_predecessors(&mut self, preds: Vec<OperatorId>) {
        self.predecessors = preds;
    }

    pub(crate) fn add_predecessor(&mut self, op: OperatorId) {
        if !self.predecessors.contains(&op) {
            self.predecessors.push(op);
        }
    }

    pub(crate) fn remove_predecessor(&mut self, op: OperatorId) {
        self.predecessors.retain(|&p| p != op);
    }

    pub(crate) fn add_successor(&mut self, op: OperatorId) {
        if !self.successors.contains(&op) {
            self.successors.push(op);
        }
    }

    pub(crate) fn remove_successor(&mut self, op: OperatorId) {
        self.successors.retain(|&s| s != op);
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}](input=", self.kind, self.guid)?;
        for input in &self.inputs {
            write!(f, "{input},")?;
        }
        write!(f, "output=")?;
        for output in &self.outputs {
            write!(f, "{output},")?;
        }
        write!(f, ")")
    }
}
