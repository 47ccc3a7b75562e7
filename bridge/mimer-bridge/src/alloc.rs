//!
//! Buffer Allocation Capability
//!
//! Every heap buffer this layer needs (the probe's fallback buffer and the
//! LOB read buffer) is obtained through a `BufferAllocator`, passed to the
//! bridge at construction. Allocation is fallible: a denied request maps to
//! the reserved out-of-memory status instead of aborting the process.
//!
//! `FaultInjector` is the allocator used by tests to drive the
//! out-of-memory branches deterministically. Its toggle belongs to the
//! instance, so one test flipping it never affects another.
//!

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::warn;

pub trait BufferAllocator {
    /// Returns a zero-filled buffer of exactly `len` bytes, or `None` if the
    /// allocation cannot be satisfied.
    fn allocate(&self, len: usize) -> Option<Vec<u8>>;
}

impl<A: BufferAllocator + ?Sized> BufferAllocator for &A {
    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        (**self).allocate(len)
    }
}

/// Allocates from the global allocator, reporting failure instead of aborting.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        if let Err(e) = buf.try_reserve_exact(len) {
            warn!(len, error = %e, "buffer allocation failed");
            return None;
        }
        buf.resize(len, 0);
        Some(buf)
    }
}

/// An allocator that can be switched to fail every request.
#[derive(Debug, Default)]
pub struct FaultInjector {
    failing: AtomicBool,
    denied: AtomicUsize,
    granted: AtomicUsize,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts out failing every allocation.
    pub fn failing() -> Self {
        let injector = Self::default();
        injector.failing.store(true, Ordering::SeqCst);
        injector
    }

    /// Sets the toggle and returns its previous value.
    pub fn set_failing(&self, failing: bool) -> bool {
        self.failing.swap(failing, Ordering::SeqCst)
    }

    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    /// Number of requests refused while the toggle was on.
    pub fn denied(&self) -> usize {
        self.denied.load(Ordering::SeqCst)
    }

    /// Number of requests satisfied.
    pub fn granted(&self) -> usize {
        self.granted.load(Ordering::SeqCst)
    }
}

impl BufferAllocator for FaultInjector {
    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        if self.is_failing() {
            self.denied.fetch_add(1, Ordering::SeqCst);
            warn!(len, "allocation denied by fault injector");
            return None;
        }
        let buf = SystemAllocator.allocate(len)?;
        self.granted.fetch_add(1, Ordering::SeqCst);
        Some(buf)
    }
}
