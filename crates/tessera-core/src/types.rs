//! Core type definitions shared across the planner.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered dimension sizes of a tensor.
pub type Shape = Vec<usize>;

/// Element types a tensor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit floating point.
    F32,
    /// 16-bit floating point.
    F16,
    /// Brain floating point 16.
    BF16,
    /// 64-bit floating point.
    F64,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// Boolean stored as one byte.
    Bool,
}

impl DataType {
    /// Width of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::I8 | DataType::U8 | DataType::Bool => 1,
            DataType::F16 | DataType::BF16 | DataType::I16 | DataType::U16 => 2,
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
        }
    }

    /// Width of the widest supported scalar; the allocator aligns to this.
    pub const fn max_size_in_bytes() -> usize {
        8
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::F32 => "Float32",
            DataType::F16 => "Float16",
            DataType::BF16 => "BFloat16",
            DataType::F64 => "Float64",
            DataType::I8 => "Int8",
            DataType::I16 => "Int16",
            DataType::I32 => "Int32",
            DataType::I64 => "Int64",
            DataType::U8 => "UInt8",
            DataType::U16 => "UInt16",
            DataType::U32 => "UInt32",
            DataType::U64 => "UInt64",
            DataType::Bool => "Bool",
        };
        f.write_str(name)
    }
}

/// Supported element conversions, one variant per (source, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum CastType {
    F32ToF16,
    F32ToI64,
    F32ToI32,
    F32ToI16,
    F32ToI8,
    I32ToF32,
    I32ToI8,
    I32ToI16,
    I16ToF32,
    I16ToI32,
    I8ToF32,
    I8ToI16,
    I8ToI32,
    U8ToF32,
    U8ToI32,
    U8ToI64,
    I32ToI64,
    I64ToI32,
    I64ToU32,
    I64ToF32,
    U32ToI64,
    F16ToF32,
    BF16ToF32,
    F32ToBF16,
    F32ToF32,
}

impl CastType {
    /// Every supported cast.
    pub const ALL: [CastType; 25] = [
        CastType::F32ToF16,
        CastType::F32ToI64,
        CastType::F32ToI32,
        CastType::F32ToI16,
        CastType::F32ToI8,
        CastType::I32ToF32,
        CastType::I32ToI8,
        CastType::I32ToI16,
        CastType::I16ToF32,
        CastType::I16ToI32,
        CastType::I8ToF32,
        CastType::I8ToI16,
        CastType::I8ToI32,
        CastType::U8ToF32,
        CastType::U8ToI32,
        CastType::U8ToI64,
        CastType::I32ToI64,
        CastType::I64ToI32,
        CastType::I64ToU32,
        CastType::I64ToF32,
        CastType::U32ToI64,
        CastType::F16ToF32,
        CastType::BF16ToF32,
        CastType::F32ToBF16,
        CastType::F32ToF32,
    ];

    /// The (source, target) pair this cast converts between.
    pub fn pair(self) -> (DataType, DataType) {
        use DataType::*;
        match self {
            CastType::F32ToF16 => (F32, F16),
            CastType::F32ToI64 => (F32, I64),
            CastType::F32ToI32 => (F32, I32),
            CastType::F32ToI16 => (F32, I16),
            CastType::F32ToI8 => (F32, I8),
            CastType::I32ToF32 => (I32, F32),
            CastType::I32ToI8 => (I32, I8),
            CastType::I32ToI16 => (I32, I16),
            CastType::I16ToF32 => (I16, F32),
            CastType::I16ToI32 => (I16, I32),
            CastType::I8ToF32 => (I8, F32),
            CastType::I8ToI16 => (I8, I16),
            CastType::I8ToI32 => (I8, I32),
            CastType::U8ToF32 => (U8, F32),
            CastType::U8ToI32 => (U8, I32),
            CastType::U8ToI64 => (U8, I64),
            CastType::I32ToI64 => (I32, I64),
            CastType::I64ToI32 => (I64, I32),
            CastType::I64ToU32 => (I64, U32),
            CastType::I64ToF32 => (I64, F32),
            CastType::U32ToI64 => (U32, I64),
            CastType::F16ToF32 => (F16, F32),
            CastType::BF16ToF32 => (BF16, F32),
            CastType::F32ToBF16 => (F32, BF16),
            CastType::F32ToF32 => (F32, F32),
        }
    }

    /// Source element type.
    pub fn source(self) -> DataType {
        self.pair().0
    }

    /// Element type produced by the cast.
    pub fn output_type(self) -> DataType {
        self.pair().1
    }

    /// Look up the cast converting `from` into `to`.
    pub fn from_pair(from: DataType, to: DataType) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|cast| cast.pair() == (from, to))
            .ok_or_else(|| CoreError::UnsupportedCast(format!("{from} -> {to}")))
    }
}

impl fmt::Display for CastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (from, to) = self.pair();
        write!(f, "{from}2{to}")
    }
}

/// Stable handle of a tensor inside its owning graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TensorId(pub(crate) usize);

impl TensorId {
    /// Slot index in the graph's tensor arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Stable handle of an operator inside its owning graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub(crate) usize);

impl OperatorId {
    /// Slot index in the graph's operator arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// Globally unique object id.
pub type Guid = u64;

/// Functional id, stable across in-place shape updates.
pub type Fuid = u64;

static NEXT_GUID: AtomicU64 = AtomicU64::new(1);
static NEXT_FUID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_guid() -> Guid {
    NEXT_GUID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_fuid() -> Fuid {
    NEXT_FUID.fetch_add(1, Ordering::Relaxed)
}

/// Byte counts reported after memory planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryReport {
    /// Bytes held by live allocations.
    pub used: usize,
    /// High-water mark of the simulated address space.
    pub peak: usize,
}
