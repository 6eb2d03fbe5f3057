//! Operator construction.

use super::Graph;
use crate::error::{CoreError, Result};
use crate::operator::{OpKind, Operator};
use crate::ops::{normalize_axis, UnaryKind};
use crate::tensor::Tensor;
use crate::types::{CastType, DataType, OperatorId, Shape, TensorId};
use tracing::trace;

impl Graph {
    /// Add an operator over `inputs`, creating its output tensors from the
    /// inferred shapes and element types.
    pub fn add_op(&mut self, kind: OpKind, inputs: &[TensorId]) -> Result<OperatorId> {
        let (kind, shapes, dtypes) = self.prepare(kind, inputs)?;
        let outputs: Vec<TensorId> = shapes
            .into_iter()
            .zip(dtypes)
            .map(|(shape, dtype)| self.add_tensor(shape, dtype))
            .collect();
        self.finish(kind, inputs, outputs)
    }

    /// Add an operator writing into caller-provided `outputs`.
    ///
    /// The outputs must match inference and must not already have a producer.
    pub fn add_op_with_outputs(
        &mut self,
        kind: OpKind,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> Result<OperatorId> {
        let (kind, shapes, dtypes) = self.prepare(kind, inputs)?;
        if shapes.len() != outputs.len() {
            return Err(CoreError::shape(format!(
                "{} produces {} output(s), {} supplied",
                kind.name(),
                shapes.len(),
                outputs.len()
            )));
        }
        for ((&out, shape), dtype) in outputs.iter().zip(&shapes).zip(&dtypes) {
            let tensor = self.tensor_ref(out)?;
            if tensor.shape() != shape || tensor.dtype() != *dtype {
                return Err(CoreError::shape(format!(
                    "{} output {out} is {:?}/{}, inferred {:?}/{}",
                    kind.name(),
                    tensor.shape(),
                    tensor.dtype(),
                    shape,
                    dtype
                )));
            }
            if let Some(src) = tensor.source() {
                return Err(CoreError::dangling(format!(
                    "{out} is already produced by operator {src}"
                )));
            }
        }
        self.finish(kind, inputs, outputs.to_vec())
    }

    fn prepare(
        &self,
        kind: OpKind,
        inputs: &[TensorId],
    ) -> Result<(OpKind, Vec<Shape>, Vec<DataType>)> {
        let tensors = inputs
            .iter()
            .map(|&id| self.tensor_ref(id))
            .collect::<Result<Vec<&Tensor>>>()?;
        let kind = kind.resolve(&tensors)?;
        let shapes = kind.infer_shape(&tensors)?;
        let dtypes = kind.infer_data_type(&tensors)?;
        Ok((kind, shapes, dtypes))
    }

    fn finish(
        &mut self,
        kind: OpKind,
        inputs: &[TensorId],
        outputs: Vec<TensorId>,
    ) -> Result<OperatorId> {
        trace!(op = kind.name(), ?inputs, ?outputs, "add operator");
        self.add_operator_and_connect(Operator::new(kind, inputs.to_vec(), outputs))
    }

    /// The single output tensor of `op`.
    pub fn output_of(&self, op: OperatorId) -> Result<TensorId> {
        self.operator_ref(op)?
            .output()
            .ok_or_else(|| CoreError::dangling(format!("operator {op} has no output")))
    }

    /// `a x b` with optional operand transposes.
    pub fn matmul(
        &mut self,
        a: TensorId,
        b: TensorId,
        trans_a: bool,
        trans_b: bool,
    ) -> Result<OperatorId> {
        self.add_op(OpKind::MatMul { trans_a, trans_b }, &[a, b])
    }

    /// Permute `input`'s axes; an empty permutation is the identity.
    pub fn transpose(&mut self, input: TensorId, permutation: Vec<usize>) -> Result<OperatorId> {
        self.add_op(OpKind::Transpose { permutation }, &[input])
    }

    /// Concatenate `inputs` along `axis`, which may be negative.
    pub fn concat(&mut self, inputs: &[TensorId], axis: i64) -> Result<OperatorId> {
        let first = inputs.first().ok_or(CoreError::ArityMismatch {
            op: "Concat",
            expected: ">= 1".to_string(),
            actual: 0,
        })?;
        let axis = normalize_axis(axis, self.tensor_ref(*first)?.rank())?;
        self.add_op(OpKind::Concat { axis }, inputs)
    }

    /// Element-wise activation.
    pub fn unary(&mut self, kind: UnaryKind, input: TensorId) -> Result<OperatorId> {
        self.add_op(OpKind::Unary(kind), &[input])
    }

    /// Clamp `input` to optional scalar bounds.
    pub fn clip(
        &mut self,
        input: TensorId,
        min: Option<f32>,
        max: Option<f32>,
    ) -> Result<OperatorId> {
        self.add_op(OpKind::Clip { min, max }, &[input])
    }

    /// Convert `input` to `to`, looking the pair up in the cast table.
    pub fn cast(&mut self, input: TensorId, to: DataType) -> Result<OperatorId> {
        let from = self.tensor_ref(input)?.dtype();
        let cast = CastType::from_pair(from, to)?;
        self.add_op(OpKind::Cast(cast), &[input])
    }
}
