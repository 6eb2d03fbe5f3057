//! Host memory runtime.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard};

use tessera_core::{CoreError, Result, Runtime};
use tracing::debug;

/// SIMD-friendly alignment: 64 bytes covers AVX-512 and a cache line.
pub fn get_simd_alignment() -> usize {
    64
}

/// Allocation counters of a [`CpuRuntime`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Total bytes ever handed out.
    pub total_allocated: usize,
    /// Bytes currently held by callers.
    pub current_allocated: usize,
    /// Highest value of `current_allocated`.
    pub peak_allocated: usize,
    /// Number of allocations.
    pub allocation_count: usize,
    /// Number of deallocations.
    pub deallocation_count: usize,
}

/// Host heap runtime with allocation statistics.
///
/// Buffers are aligned to [`get_simd_alignment`]. A zero-byte request still
/// returns a unique one-byte allocation so the pointer is valid to free.
#[derive(Debug, Clone)]
pub struct CpuRuntime {
    alignment: usize,
    stats: Arc<Mutex<RuntimeStats>>,
}

impl Default for CpuRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuRuntime {
    /// Runtime with SIMD alignment.
    pub fn new() -> Self {
        Self::with_alignment(get_simd_alignment())
    }

    /// Runtime with a custom alignment, raised to at least 8 bytes.
    pub fn with_alignment(alignment: usize) -> Self {
        Self {
            alignment: alignment.max(tessera_core::DataType::max_size_in_bytes()),
            stats: Arc::new(Mutex::new(RuntimeStats::default())),
        }
    }

    /// Alignment of every returned buffer.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> RuntimeStats {
        self.lock_stats().clone()
    }

    fn lock_stats(&self) -> MutexGuard<'_, RuntimeStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn layout(&self, nbytes: usize) -> Result<Layout> {
        Layout::from_size_align(nbytes.max(1), self.alignment)
            .map_err(|e| CoreError::Runtime(format!("invalid layout for {nbytes} bytes: {e}")))
    }
}

impl Runtime for CpuRuntime {
    fn name(&self) -> &str {
        "cpu"
    }

    fn allocate(&self, nbytes: usize) -> Result<NonNull<u8>> {
        let layout = self.layout(nbytes)?;
        // SAFETY: layout has a non-zero size.
        let ptr = NonNull::new(unsafe { alloc(layout) })
            .ok_or_else(|| CoreError::Runtime(format!("failed to allocate {nbytes} bytes")))?;

        {
            let mut stats = self.lock_stats();
            stats.total_allocated += nbytes;
            stats.current_allocated += nbytes;
            stats.peak_allocated = stats.peak_allocated.max(stats.current_allocated);
            stats.allocation_count += 1;
        }

        debug!(
            "Allocated {} bytes at {:?} with alignment {}",
            nbytes, ptr, self.alignment
        );
        Ok(ptr)
    }

    fn deallocate(&self, ptr: NonNull<u8>, nbytes: usize) {
        let Ok(layout) = self.layout(nbytes) else {
            return;
        };
        // SAFETY: `ptr` came from `allocate` with the same size and alignment.
        unsafe { dealloc(ptr.as_ptr(), layout) };

        let mut stats = self.lock_stats();
        stats.current_allocated = stats.current_allocated.saturating_sub(nbytes);
        stats.deallocation_count += 1;
        debug!("Deallocated {} bytes at {:?}", nbytes, ptr);
    }
}
