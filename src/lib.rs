pub mod dsl;
pub mod engine;
pub mod graph;
#[doc(hidden)]
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;

/// Network-wide cardinalities, fixed at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Phase cardinality `P`: Phaser/RandPhaser phases live in `[0, P)`,
    /// Multiplex routes by `selector mod P`.
    pub phases: usize,
    /// Element cardinality `N`: per-particle index range and Buffer ring size.
    pub elements: usize,
}

impl Default for Config {
    /// 4 phases, 40 particles.
    fn default() -> Self {
        Self {
            phases: 4,
            elements: 40,
        }
    }
}

#[cfg(test)]
use std::alloc::{GlobalAlloc, Layout, System};

#[cfg(test)]
struct CountingAllocator;

#[cfg(test)]
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        unsafe {
            crate::harness::ALLOC_COUNT += 1;
        }
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[cfg(test)]
#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;
