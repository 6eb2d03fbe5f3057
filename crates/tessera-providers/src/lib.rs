//! Device runtimes that back the tessera arena.
//!
//! The planner asks a [`Runtime`](tessera_core::Runtime) for exactly one
//! buffer per graph. [`CpuRuntime`] serves it from the host heap.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod cpu;

pub use cpu::{get_simd_alignment, CpuRuntime, RuntimeStats};
