//!
//! Probe-then-grow fetching of variable-length output.
//!
//! The accessor is first called with an inline buffer of `INLINE_CAPACITY`
//! bytes living on the stack. If the reported length fits, the result stays
//! inline and no heap allocation happens. Otherwise one buffer sized from
//! the reported length is obtained from the allocator and the accessor is
//! called a second time.
//!
//! A reported length of zero is an empty value and a negative one is the
//! engine's error status; both short-circuit without a second call.
//!

use std::ops::Deref;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::alloc::BufferAllocator;
use crate::status::{Fetched, Status};

/// Capacity of the first-pass buffer.
pub const INLINE_CAPACITY: usize = 128;

/// How the fallback capacity is derived from the first-pass length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Growth {
    /// Second-pass bytes needed per reported unit.
    pub expansion: usize,
    /// Extra trailing units reserved for a terminator.
    pub terminator: usize,
}

impl Growth {
    pub const BINARY: Growth = Growth {
        expansion: 1,
        terminator: 0,
    };

    pub const TEXT: Growth = Growth {
        expansion: 1,
        terminator: 1,
    };

    pub const fn text_with_expansion(expansion: usize) -> Growth {
        Growth {
            expansion,
            terminator: 1,
        }
    }

    /// Buffer size for `reported` units, or `None` on overflow.
    pub fn capacity_for(self, reported: usize) -> Option<usize> {
        reported
            .checked_mul(self.expansion)?
            .checked_add(self.terminator)
    }
}

/// Output of a probe: kept inline when short, an owned buffer otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Probed {
    Inline(SmallVec<[u8; INLINE_CAPACITY]>),
    Grown(Vec<u8>),
}

impl Probed {
    pub fn empty() -> Self {
        Probed::Inline(SmallVec::new())
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Probed::Inline(bytes) => bytes.as_slice(),
            Probed::Grown(bytes) => bytes.as_slice(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Probed::Inline(_))
    }

    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Probed::Inline(bytes) => bytes.into_vec(),
            Probed::Grown(bytes) => bytes,
        }
    }
}

impl Deref for Probed {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Probed {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Runs the two-call protocol against `access`.
pub fn probe<A, F>(alloc: &A, growth: Growth, mut access: F) -> Fetched<Probed>
where
    A: BufferAllocator + ?Sized,
    F: FnMut(&mut [u8]) -> i32,
{
    let mut inline = [0u8; INLINE_CAPACITY];
    let reported = access(&mut inline);
    if reported < 0 {
        return Fetched::failed(reported);
    }
    let reported = reported as usize;
    if reported == 0 {
        return Fetched::ok(Probed::empty());
    }
    if reported < INLINE_CAPACITY {
        return Fetched::ok(Probed::Inline(SmallVec::from_buf_and_len(inline, reported)));
    }

    let Some(capacity) = growth.capacity_for(reported) else {
        warn!(reported, "probe capacity overflows usize");
        return Fetched::failed(Status::OUT_OF_MEMORY);
    };
    debug!(reported, capacity, "probe falling back to grown buffer");
    let Some(mut grown) = alloc.allocate(capacity) else {
        return Fetched::failed(Status::OUT_OF_MEMORY);
    };

    let rc = access(&mut grown);
    if rc < 0 {
        return Fetched::failed(rc);
    }
    let usable = capacity - growth.terminator;
    grown.truncate((rc as usize).min(usable));
    Fetched::ok(Probed::Grown(grown))
}
