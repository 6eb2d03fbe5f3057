//! Best-fit arena allocator over a simulated address space.
//!
//! The planner first asks for an offset per tensor, then realizes one real
//! buffer sized to the peak of the simulated space. Free blocks are indexed
//! three ways:
//!
//! - an ordered set keyed by `(size, addr)` for best-fit lookup in O(log n)
//! - a map from block start address to size (right-neighbour lookup)
//! - a map from block end address to size (left-neighbour lookup)
//!
//! so freeing coalesces with both neighbours in O(1) map lookups without a
//! linked free list.

use crate::error::{CoreError, Result};
use crate::runtime::Runtime;
use crate::types::{DataType, MemoryReport};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, info};

// Field order matters: the derived `Ord` sorts by size, then address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FreeBlock {
    size: usize,
    addr: usize,
}

impl FreeBlock {
    fn end(&self) -> usize {
        self.addr + self.size
    }
}

/// Snapshot of allocator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocatorStats {
    /// Bytes held by live allocations.
    pub used: usize,
    /// High-water mark of the simulated address space.
    pub peak: usize,
    /// Alignment unit in bytes.
    pub alignment: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Bytes held by free blocks.
    pub free_bytes: usize,
    /// Whether the backing buffer has been requested from the runtime.
    pub realized: bool,
}

/// Simulated linear allocator that lazily materializes one real buffer.
#[derive(Debug)]
pub struct Allocator {
    runtime: Arc<dyn Runtime>,
    used: usize,
    peak: usize,
    alignment: usize,
    ptr: Option<NonNull<u8>>,
    free_blocks: BTreeSet<FreeBlock>,
    block_start_to_size: HashMap<usize, usize>,
    block_end_to_size: HashMap<usize, usize>,
}

impl Allocator {
    /// Create an empty allocator backed by `runtime`.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            used: 0,
            peak: 0,
            alignment: DataType::max_size_in_bytes(),
            ptr: None,
            free_blocks: BTreeSet::new(),
            block_start_to_size: HashMap::new(),
            block_end_to_size: HashMap::new(),
        }
    }

    /// Runtime that will provide the real buffer.
    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Bytes held by live allocations.
    pub fn used(&self) -> usize {
        self.used
    }

    /// High-water mark of the simulated address space.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Alignment unit applied to every request.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether [`Allocator::get_ptr`] has already materialized the buffer.
    pub fn is_realized(&self) -> bool {
        self.ptr.is_some()
    }

    /// Reserve `size` bytes and return the block's offset.
    pub fn alloc(&mut self, size: usize) -> Result<usize> {
        self.ensure_unrealized("alloc")?;
        let size = self.aligned_size(size)?;

        let best_fit = self
            .free_blocks
            .range(FreeBlock { size, addr: 0 }..)
            .next()
            .copied();

        let addr = if let Some(block) = best_fit {
            self.remove_block(block);
            if block.size > size {
                self.insert_block(FreeBlock {
                    size: block.size - size,
                    addr: block.addr + size,
                });
            }
            block.addr
        } else if let Some(tail_size) = self.block_end_to_size.get(&self.peak).copied() {
            // Grow the free block touching the end of the space instead of
            // leaving it stranded behind a fresh block.
            let tail = FreeBlock {
                size: tail_size,
                addr: self.peak - tail_size,
            };
            let peak = self.grow_peak(size - tail_size)?;
            self.remove_block(tail);
            self.peak = peak;
            tail.addr
        } else {
            let addr = self.peak;
            self.peak = self.grow_peak(size)?;
            addr
        };

        self.used += size;
        debug!(addr, size, used = self.used, peak = self.peak, "alloc");
        Ok(addr)
    }

    /// Return the block `[addr, addr + size)` and merge it with free neighbours.
    pub fn free(&mut self, addr: usize, size: usize) -> Result<()> {
        self.ensure_unrealized("free")?;
        if addr % self.alignment != 0 {
            return Err(CoreError::misuse(format!(
                "free at {addr} is not a multiple of the {}-byte alignment",
                self.alignment
            )));
        }
        let size = self.aligned_size(size)?;

        let end = match addr.checked_add(size) {
            Some(end) if end <= self.peak => end,
            _ => {
                return Err(CoreError::misuse(format!(
                    "free of {size} bytes at {addr} reaches beyond peak {}",
                    self.peak
                )))
            }
        };
        if self.overlaps_free_block(addr, end) || size > self.used {
            return Err(CoreError::misuse(format!(
                "block at {addr} of {size} bytes is not allocated"
            )));
        }

        let mut block = FreeBlock { size, addr };

        if let Some(left_size) = self.block_end_to_size.get(&block.addr).copied() {
            let left = FreeBlock {
                size: left_size,
                addr: block.addr - left_size,
            };
            self.remove_block(left);
            block.addr = left.addr;
            block.size += left.size;
        }

        if let Some(right_size) = self.block_start_to_size.get(&block.end()).copied() {
            let right = FreeBlock {
                size: right_size,
                addr: block.end(),
            };
            self.remove_block(right);
            block.size += right.size;
        }

        self.insert_block(block);
        self.used -= size;
        debug!(addr, size, merged_addr = block.addr, merged_size = block.size, "free");
        Ok(())
    }

    /// Materialize the backing buffer on first call; later calls return the
    /// same pointer.
    pub fn get_ptr(&mut self) -> Result<NonNull<u8>> {
        if let Some(ptr) = self.ptr {
            return Ok(ptr);
        }
        let ptr = self.runtime.allocate(self.peak)?;
        info!(
            runtime = self.runtime.name(),
            bytes = self.peak,
            "allocator realized backing buffer"
        );
        self.ptr = Some(ptr);
        Ok(ptr)
    }

    /// Used and peak byte counts.
    pub fn report(&self) -> MemoryReport {
        MemoryReport {
            used: self.used,
            peak: self.peak,
        }
    }

    /// Full state snapshot.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            used: self.used,
            peak: self.peak,
            alignment: self.alignment,
            free_blocks: self.free_blocks.len(),
            free_bytes: self.free_blocks.iter().map(|b| b.size).sum(),
            realized: self.ptr.is_some(),
        }
    }

    /// Log the usage report.
    pub fn info(&self) {
        info!(
            used = self.used,
            peak = self.peak,
            "Used memory: {}, peak memory: {}",
            self.used,
            self.peak
        );
    }

    /// Round `size` up to the alignment unit; zero-byte requests take one unit.
    ///
    /// Fails when the rounded size does not fit in `usize`.
    pub fn aligned_size(&self, size: usize) -> Result<usize> {
        if size == 0 {
            return Ok(self.alignment);
        }
        ((size - 1) / self.alignment * self.alignment)
            .checked_add(self.alignment)
            .ok_or_else(|| {
                CoreError::misuse(format!("request of {size} bytes overflows the address space"))
            })
    }

    fn grow_peak(&self, by: usize) -> Result<usize> {
        self.peak.checked_add(by).ok_or_else(|| {
            CoreError::misuse(format!(
                "growing peak {} by {by} bytes overflows the address space",
                self.peak
            ))
        })
    }

    fn ensure_unrealized(&self, what: &str) -> Result<()> {
        if self.ptr.is_some() {
            return Err(CoreError::misuse(format!(
                "{what} after the backing buffer was realized"
            )));
        }
        Ok(())
    }

    /// Whether `[addr, end)` intersects a free block.
    ///
    /// Linear in the number of free blocks; planning itself never frees.
    fn overlaps_free_block(&self, addr: usize, end: usize) -> bool {
        self.free_blocks
            .iter()
            .any(|block| block.addr < end && addr < block.end())
    }

    fn insert_block(&mut self, block: FreeBlock) {
        self.free_blocks.insert(block);
        self.block_start_to_size.insert(block.addr, block.size);
        self.block_end_to_size.insert(block.end(), block.size);
    }

    fn remove_block(&mut self, block: FreeBlock) {
        self.free_blocks.remove(&block);
        self.block_start_to_size.remove(&block.addr);
        self.block_end_to_size.remove(&block.end());
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            self.runtime.deallocate(ptr, self.peak);
        }
    }
}
