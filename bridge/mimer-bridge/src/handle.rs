//!
//! Opaque Engine Handles
//!
//! Session, statement and lob handles are engine-side resources that cross
//! the boundary as 64-bit integers. This layer never dereferences them and
//! never tracks whether they are still alive; it only carries the bits back
//! to the engine's own calls.
//!
//! - `SessionHandle` and `StatementHandle` are `Copy`: the caller opens and
//!   closes them explicitly and may hold them across calls.
//! - `LobHandle` is deliberately neither `Copy` nor `Clone`. It is created
//!   inside a single get/set LOB call and dropped when that call's chunk
//!   loop ends, so it cannot be stored or reused.
//!

use std::fmt;

/// Raw bit pattern of a foreign handle. Zero is the null handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RawHandle(u64);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    pub const fn from_bits(bits: u64) -> Self {
        RawHandle(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

macro_rules! caller_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(RawHandle);

        impl $name {
            pub const NULL: $name = $name(RawHandle::NULL);

            pub const fn from_bits(bits: u64) -> Self {
                $name(RawHandle::from_bits(bits))
            }

            pub const fn bits(self) -> u64 {
                self.0.bits()
            }

            pub const fn raw(self) -> RawHandle {
                self.0
            }

            pub const fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl From<$name> for RawHandle {
            fn from(handle: $name) -> RawHandle {
                handle.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

caller_handle!(
    /// An engine connection. Created by begin-session, destroyed by end-session.
    SessionHandle
);

caller_handle!(
    /// A prepared statement owned by a session. Carries at most one open cursor.
    StatementHandle
);

/// A transfer handle negotiated by a get/set LOB call.
#[derive(Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct LobHandle(RawHandle);

impl LobHandle {
    pub const fn from_bits(bits: u64) -> Self {
        LobHandle(RawHandle::from_bits(bits))
    }

    pub const fn bits(&self) -> u64 {
        self.0.bits()
    }

    pub const fn is_null(&self) -> bool {
        self.0.is_null()
    }
}
