//! Ordering and structural validation.

use super::Graph;
use crate::error::{CoreError, Result};
use crate::types::OperatorId;
use std::collections::HashSet;
use tracing::debug;

impl Graph {
    /// Reorder operators so every producer precedes its consumers.
    ///
    /// Operators are placed in wavefronts: each scan over the current order
    /// appends every operator whose inputs are all graph inputs or already
    /// placed, keeping the original relative order within a wavefront.
    /// Returns `false` and leaves the order untouched if there is a cycle.
    pub fn topological_sort(&mut self) -> bool {
        if self.sorted {
            return true;
        }
        match self.wavefront_order() {
            Ok(order) => {
                self.order = order;
                self.sorted = true;
                true
            }
            Err(stuck) => {
                debug!(stuck, "topological sort found a cycle");
                false
            }
        }
    }

    /// Sort if needed, reporting a cycle as an error.
    pub fn ensure_sorted(&mut self) -> Result<()> {
        if self.sorted {
            return Ok(());
        }
        let order = self.wavefront_order().map_err(CoreError::CycleDetected)?;
        self.order = order;
        self.sorted = true;
        Ok(())
    }

    /// Wavefront order, or the number of operators that could not be placed.
    fn wavefront_order(&self) -> std::result::Result<Vec<OperatorId>, usize> {
        let mut sorted = Vec::with_capacity(self.order.len());
        let mut placed: HashSet<OperatorId> = HashSet::with_capacity(self.order.len());

        while sorted.len() < self.order.len() {
            let mut modified = false;
            for &id in &self.order {
                if placed.contains(&id) {
                    continue;
                }
                let Some(op) = self.operator(id) else {
                    continue;
                };
                let ready = op.inputs().iter().all(|&input| {
                    match self.tensor(input).and_then(|t| t.source()) {
                        None => true,
                        Some(src) => placed.contains(&src),
                    }
                });
                if ready {
                    modified = true;
                    sorted.push(id);
                    placed.insert(id);
                }
            }
            if !modified {
                return Err(self.order.len() - sorted.len());
            }
        }
        Ok(sorted)
    }

    /// Check the structural invariants of the graph.
    ///
    /// In order: every tensor is linked and its source and targets are live
    /// operators; every operator's tensors are live and its neighbours are
    /// live operators; functional ids are unique.
    pub fn check_valid(&self) -> Result<()> {
        for (id, tensor) in self.tensors() {
            if !tensor.is_linked() {
                return Err(CoreError::dangling(format!(
                    "tensor {id} has neither source nor targets"
                )));
            }
            for &target in tensor.targets() {
                if self.operator(target).is_none() {
                    return Err(CoreError::dangling(format!(
                        "tensor {id} targets missing operator {target}"
                    )));
                }
            }
            if let Some(source) = tensor.source() {
                if self.operator(source).is_none() {
                    return Err(CoreError::dangling(format!(
                        "tensor {id} sourced from missing operator {source}"
                    )));
                }
            }
        }

        for (id, op) in self.operators() {
            for &tensor in op.inputs().iter().chain(op.outputs()) {
                if self.tensor(tensor).is_none() {
                    return Err(CoreError::dangling(format!(
                        "operator {id} uses missing tensor {tensor}"
                    )));
                }
            }
            for &other in op.predecessors().iter().chain(op.successors()) {
                if self.operator(other).is_none() {
                    return Err(CoreError::dangling(format!(
                        "operator {id} is adjacent to missing operator {other}"
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for (_, tensor) in self.tensors() {
            if !seen.insert(tensor.fuid()) {
                return Err(CoreError::DuplicateIdentity(tensor.fuid()));
            }
        }
        Ok(())
    }
}
