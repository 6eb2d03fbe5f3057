//! Tessera planning core.
//!
//! Given a graph of operators and tensors, this crate orders the operators,
//! checks structural invariants, infers output shapes and element types, and
//! statically places every tensor in one arena whose backing buffer is
//! requested from a [`Runtime`] exactly once.
//!
//! ## Pipeline
//!
//! - **Build**: [`Graph::add_op`] and the typed builders wire tensor and
//!   operator links as operators are inserted
//! - **Order**: [`Graph::topological_sort`] places operators in wavefronts
//! - **Infer**: [`Graph::infer_shapes`] refreshes output shapes in place
//! - **Plan**: [`Graph::plan_memory`] reserves offsets in the [`Allocator`]
//!   and binds each tensor to `(base, offset)`
//!
//! Graph rewrites live in the `tessera-graph` crate.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_core::{DataType, Graph, Runtime};
//! # use std::ptr::NonNull;
//! # #[derive(Debug)]
//! # struct Host;
//! # impl Runtime for Host {
//! #     fn name(&self) -> &str { "host" }
//! #     fn allocate(&self, n: usize) -> tessera_core::Result<NonNull<u8>> {
//! #         let layout = std::alloc::Layout::from_size_align(n.max(1), 8).unwrap();
//! #         Ok(NonNull::new(unsafe { std::alloc::alloc(layout) }).unwrap())
//! #     }
//! #     fn deallocate(&self, p: NonNull<u8>, n: usize) {
//! #         let layout = std::alloc::Layout::from_size_align(n.max(1), 8).unwrap();
//! #         unsafe { std::alloc::dealloc(p.as_ptr(), layout) }
//! #     }
//! # }
//!
//! let mut graph = Graph::new(Arc::new(Host));
//! let a = graph.add_tensor(vec![2, 3], DataType::F32);
//! let b = graph.add_tensor(vec![3, 4], DataType::F32);
//! let mm = graph.matmul(a, b, false, false)?;
//! let c = graph.output_of(mm)?;
//! assert_eq!(graph.tensor(c).unwrap().shape(), &vec![2, 4]);
//!
//! let report = graph.plan_memory()?;
//! assert_eq!(report.peak, 24 + 48 + 32);
//! # Ok::<(), tessera_core::CoreError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod error;
pub mod graph;
pub mod logging;
pub mod operator;
pub mod ops;
pub mod runtime;
pub mod tensor;
pub mod types;

pub use allocator::{Allocator, AllocatorStats};
pub use error::{CoreError, Result};
pub use graph::Graph;
pub use logging::{init_logging, LogLevel, LoggingConfig};
pub use operator::{OpKind, Operator};
pub use ops::UnaryKind;
pub use runtime::Runtime;
pub use tensor::{DataBlob, Tensor};
pub use types::{CastType, DataType, Fuid, Guid, MemoryReport, OperatorId, Shape, TensorId};
