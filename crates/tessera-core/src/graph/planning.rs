//! Shape propagation and static memory planning.

use super::Graph;
use crate::error::{CoreError, Result};
use crate::tensor::{DataBlob, Tensor};
use crate::types::{MemoryReport, TensorId};
use tracing::{debug, info};

impl Graph {
    /// Re-run inference over the sorted operators and update output tensors
    /// in place when their shape or dtype changed.
    ///
    /// Tensor identity (guid and fuid) is never touched.
    pub fn infer_shapes(&mut self) -> Result<()> {
        self.ensure_sorted()?;
        let order = self.order.clone();
        for id in order {
            let op = self.operator_ref(id)?;
            let inputs = op
                .inputs()
                .iter()
                .map(|&t| self.tensor_ref(t))
                .collect::<Result<Vec<&Tensor>>>()?;
            let shapes = op.kind().infer_shape(&inputs)?;
            let dtypes = op.kind().infer_data_type(&inputs)?;
            let outputs = op.outputs().to_vec();
            if shapes.len() != outputs.len() || dtypes.len() != outputs.len() {
                return Err(CoreError::shape(format!(
                    "operator {id} inferred {} output(s) but has {}",
                    shapes.len(),
                    outputs.len()
                )));
            }

            for ((output, shape), dtype) in outputs.into_iter().zip(shapes).zip(dtypes) {
                let tensor = self.tensor_mut(output)?;
                if tensor.shape() != &shape {
                    debug!(tensor = %output, old = ?tensor.shape(), new = ?shape, "shape updated");
                    tensor.set_shape(shape);
                }
                if tensor.dtype() != dtype {
                    debug!(tensor = %output, old = %tensor.dtype(), new = %dtype, "dtype updated");
                    tensor.set_dtype(dtype);
                }
            }
        }
        Ok(())
    }

    /// Give every tensor its own block in the arena and bind it.
    ///
    /// Offsets are all reserved before the backing buffer is realized,
    /// because the buffer size is the final peak. There is no liveness
    /// analysis: blocks are never freed while planning.
    pub fn plan_memory(&mut self) -> Result<MemoryReport> {
        self.ensure_sorted()?;

        let mut offsets: Vec<(TensorId, usize)> = Vec::with_capacity(self.tensors.len());
        for (id, tensor) in self.tensors() {
            offsets.push((id, tensor.bytes()?));
        }
        for (id, bytes) in offsets.iter_mut() {
            let offset = self.allocator.alloc(*bytes)?;
            debug!(tensor = %id, bytes = *bytes, offset, "tensor placed");
            *bytes = offset;
        }

        let base = self.allocator.get_ptr()?;
        for (id, offset) in offsets {
            self.tensor_mut(id)?.set_data_blob(DataBlob::new(base, offset));
        }

        self.allocator.info();
        let report = self.allocator.report();
        info!(
            tensors = self.num_tensors(),
            used = report.used,
            peak = report.peak,
            "memory plan complete"
        );
        Ok(report)
    }
}
