//! Shape-preserving operators: unary activations, clip and cast.

use crate::error::{CoreError, Result};
use crate::types::{CastType, DataType, Shape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element-wise functions with one input and one output of the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum UnaryKind {
    Relu,
    Sigmoid,
    Tanh,
    Abs,
    Sqrt,
    Neg,
    Exp,
    Log,
    Erf,
    Silu,
    Gelu,
}

impl fmt::Display for UnaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Output shape of a shape-preserving operator: the first input's shape.
///
/// Clip may carry auxiliary bound tensors after the data input; they never
/// affect the output shape.
pub fn elementwise_shape(inputs: &[&[usize]]) -> Result<Shape> {
    inputs
        .first()
        .map(|s| s.to_vec())
        .ok_or(CoreError::ArityMismatch {
            op: "Elementwise",
            expected: ">= 1".to_string(),
            actual: 0,
        })
}

/// Element type produced by `cast` applied to an `input` tensor.
pub fn cast_data_type(cast: CastType, input: DataType) -> Result<DataType> {
    if cast.source() != input {
        return Err(CoreError::UnsupportedCast(format!(
            "{cast} applied to a {input} tensor"
        )));
    }
    Ok(cast.output_type())
}
