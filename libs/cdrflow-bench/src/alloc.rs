//! Heap accounting through a counting global allocator.
//!
//! The binary installs [`CountingAllocator`] as `#[global_allocator]`; the
//! harness reads [`AllocSnapshot`]s around topology startup and around the
//! measured loop. When the allocator is not installed all counters stay at
//! zero and the derived metrics report 0.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);
static FREED_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// [`System`] allocator that counts bytes and allocation calls.
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            ALLOCATED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
            ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            ALLOCATED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
            ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        FREED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            // Accounted as a free of the old block plus a fresh allocation.
            FREED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
            ALLOCATED_BYTES.fetch_add(new_size as u64, Ordering::Relaxed);
            ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        new_ptr
    }
}

/// Point-in-time copy of the allocator counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocSnapshot {
    pub allocated_bytes: u64,
    pub freed_bytes: u64,
    pub allocations: u64,
}

impl AllocSnapshot {
    pub fn now() -> Self {
        Self {
            allocated_bytes: ALLOCATED_BYTES.load(Ordering::Relaxed),
            freed_bytes: FREED_BYTES.load(Ordering::Relaxed),
            allocations: ALLOCATIONS.load(Ordering::Relaxed),
        }
    }

    /// Bytes currently held on the heap (as seen by the counters).
    pub fn live_bytes(&self) -> i64 {
        self.allocated_bytes as i64 - self.freed_bytes as i64
    }

    /// Growth of live heap since `earlier`, clamped at zero.
    pub fn live_growth_since(&self, earlier: &AllocSnapshot) -> u64 {
        (self.live_bytes() - earlier.live_bytes()).max(0) as u64
    }

    pub fn bytes_allocated_since(&self, earlier: &AllocSnapshot) -> u64 {
        self.allocated_bytes.saturating_sub(earlier.allocated_bytes)
    }

    pub fn allocations_since(&self, earlier: &AllocSnapshot) -> u64 {
        self.allocations.saturating_sub(earlier.allocations)
    }
}

/// Whether [`CountingAllocator`] is the active global allocator.
pub fn tracking_active() -> bool {
    let before = ALLOCATIONS.load(Ordering::Relaxed);
    let sample = std::hint::black_box(Box::new(0u64));
    drop(sample);
    ALLOCATIONS.load(Ordering::Relaxed) != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_is_clamped() {
        let before = AllocSnapshot { allocated_bytes: 100, freed_bytes: 0, allocations: 1 };
        let after = AllocSnapshot { allocated_bytes: 150, freed_bytes: 120, allocations: 3 };
        assert_eq!(after.live_growth_since(&before), 0);
        assert_eq!(after.bytes_allocated_since(&before), 50);
        assert_eq!(after.allocations_since(&before), 2);
    }

    #[test]
    fn test_growth_counts_retained_bytes() {
        let before = AllocSnapshot { allocated_bytes: 1_000, freed_bytes: 200, allocations: 10 };
        let after = AllocSnapshot { allocated_bytes: 5_000, freed_bytes: 1_200, allocations: 30 };
        assert_eq!(after.live_growth_since(&before), 3_000);
    }

    #[test]
    fn test_untracked_in_unit_tests() {
        // The test binary uses the system allocator.
        assert!(!tracking_active());
        assert_eq!(AllocSnapshot::now(), AllocSnapshot::default());
    }
}
