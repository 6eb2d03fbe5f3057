//! Data-carrying graph nodes.
//!
//! A [`Tensor`] describes the shape and element type of a value flowing
//! between operators. It never owns the operators it is linked to: the
//! producer and the consumers are recorded as [`OperatorId`]s that resolve
//! through the owning [`Graph`](crate::graph::Graph).

use crate::error::{CoreError, Result};
use crate::types::{next_fuid, next_guid, DataType, Fuid, Guid, OperatorId, Shape};
use std::fmt;
use std::ptr::NonNull;

/// Memory bound to a tensor by the planner: the arena base plus a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlob {
    base: NonNull<u8>,
    offset: usize,
}

impl DataBlob {
    /// Bind `offset` bytes into the arena starting at `base`.
    pub fn new(base: NonNull<u8>, offset: usize) -> Self {
        Self { base, offset }
    }

    /// Base pointer of the arena.
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Byte offset of the tensor inside the arena.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Address of the tensor's first byte.
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr().wrapping_add(self.offset)
    }
}

/// A tensor node: shape, dtype, identity and producer/consumer links.
#[derive(Debug, Clone)]
pub struct Tensor {
    guid: Guid,
    fuid: Fuid,
    shape: Shape,
    dtype: DataType,
    source: Option<OperatorId>,
    targets: Vec<OperatorId>,
    data: Option<DataBlob>,
}

impl Tensor {
    /// Create an unlinked tensor with fresh identities.
    pub fn new(shape: Shape, dtype: DataType) -> Self {
        Self {
            guid: next_guid(),
            fuid: next_fuid(),
            shape,
            dtype,
            source: None,
            targets: Vec::new(),
            data: None,
        }
    }

    /// Copy of this tensor as a new object with the same functional id.
    ///
    /// Links and bound memory are not carried over.
    pub fn replicate(&self) -> Self {
        Self {
            guid: next_guid(),
            fuid: self.fuid,
            shape: self.shape.clone(),
            dtype: self.dtype,
            source: None,
            targets: Vec::new(),
            data: None,
        }
    }

    /// Unique id of this object.
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// Functional id; survives in-place shape updates.
    pub fn fuid(&self) -> Fuid {
        self.fuid
    }

    /// Dimension sizes.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Element type.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Number of elements, or `None` if the count overflows `usize`.
    pub fn numel(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Size of the tensor's data in bytes.
    pub fn bytes(&self) -> Result<usize> {
        self.numel()
            .and_then(|n| n.checked_mul(self.dtype.size_in_bytes()))
            .ok_or_else(|| {
                CoreError::shape(format!(
                    "{:?} tensor of shape {:?} is too large to address",
                    self.dtype, self.shape
                ))
            })
    }

    /// Producing operator, if any.
    pub fn source(&self) -> Option<OperatorId> {
        self.source
    }

    /// Consuming operators in link order.
    pub fn targets(&self) -> &[OperatorId] {
        &self.targets
    }

    /// Memory bound by the planner.
    pub fn data(&self) -> Option<&DataBlob> {
        self.data.as_ref()
    }

    /// Whether the tensor has a producer or at least one consumer.
    pub fn is_linked(&self) -> bool {
        self.source.is_some() || !self.targets.is_empty()
    }

    pub(crate) fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    pub(crate) fn set_dtype(&mut self, dtype: DataType) {
        self.dtype = dtype;
    }

    pub(crate) fn set_source(&mut self, op: Option<OperatorId>) {
        self.source = op;
    }

    pub(crate) fn add_target(&mut self, op: OperatorId) {
        if !self.targets.contains(&op) {
            self.targets.push(op);
        }
    }

    pub(crate) fn remove_target(&mut self, op: OperatorId) {
        self.targets.retain(|&t| t != op);
    }

    pub(crate) fn set_data_blob(&mut self, blob: DataBlob) {
        self.data = Some(blob);
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor {}, Fuid {}, shape {:?}, dtype {}",
            self.guid, self.fuid, self.shape, self.dtype
        )?;
        match self.source {
            Some(op) => write!(f, ", source {op}")?,
            None => write!(f, ", source None")?,
        }
        write!(f, ", targets {:?}", self.targets.iter().map(|t| t.index()).collect::<Vec<_>>())?;
        if let Some(blob) = &self.data {
            write!(f, ", offset {}", blob.offset())?;
        }
        Ok(())
    }
}
