//! Shape and dtype inference for each operator kind.
//!
//! The functions here are pure: they take input shapes (and, for casts,
//! element types) and return what the operator produces, or the validation
//! error that makes the operator ill-formed.

pub mod elementwise;
pub mod matrix;
pub mod shape;

pub use elementwise::{cast_data_type, elementwise_shape, UnaryKind};
pub use matrix::matmul_shape;
pub use shape::{concat_shape, normalize_axis, normalize_permutation, transpose_shape};
