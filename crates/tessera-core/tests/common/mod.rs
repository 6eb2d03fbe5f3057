// Common test utilities for tessera-core integration tests

#![allow(dead_code)]

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};
use tessera_core::{CoreError, DataType, Graph, OperatorId, Runtime, TensorId};

/// Host runtime recording every buffer it hands out and takes back.
#[derive(Debug, Default)]
pub struct CountingRuntime {
    pub allocations: Mutex<Vec<usize>>,
    pub deallocations: Mutex<Vec<usize>>,
}

fn layout(nbytes: usize) -> Layout {
    Layout::from_size_align(nbytes.max(1), DataType::max_size_in_bytes()).unwrap()
}

impl Runtime for CountingRuntime {
    fn name(&self) -> &str {
        "counting-host"
    }

    fn allocate(&self, nbytes: usize) -> tessera_core::Result<NonNull<u8>> {
        self.allocations.lock().unwrap().push(nbytes);
        let ptr = unsafe { alloc(layout(nbytes)) };
        NonNull::new(ptr).ok_or_else(|| CoreError::Runtime("host allocation failed".into()))
    }

    fn deallocate(&self, ptr: NonNull<u8>, nbytes: usize) {
        self.deallocations.lock().unwrap().push(nbytes);
        unsafe { dealloc(ptr.as_ptr(), layout(nbytes)) }
    }
}

pub fn runtime() -> Arc<CountingRuntime> {
    Arc::new(CountingRuntime::default())
}

pub fn graph() -> Graph {
    Graph::new(runtime())
}

/// x[2,3] -> Relu -> Transpose(1,0) -> MatMul with w[2,4]
///
/// Returns the graph, the input, the weight and the final operator.
pub fn create_linear_graph() -> (Graph, TensorId, TensorId, OperatorId) {
    let mut g = graph();
    let x = g.add_tensor(vec![2, 3], DataType::F32);
    let w = g.add_tensor(vec![2, 4], DataType::F32);
    let relu = g.unary(tessera_core::UnaryKind::Relu, x).unwrap();
    let y = g.output_of(relu).unwrap();
    let t = g.transpose(y, vec![1, 0]).unwrap();
    let yt = g.output_of(t).unwrap();
    let mm = g.matmul(yt, w, false, false).unwrap();
    (g, x, w, mm)
}
