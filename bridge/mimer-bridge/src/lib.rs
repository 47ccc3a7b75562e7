//!
//! Mimer SQL Marshaling Layer
//!
//! Sits between a host and the engine's fixed, C-shaped procedure
//! interface. The engine wants caller-owned fixed buffers, opaque handles
//! and bounded chunk transfers; the host wants growable values, nulls and
//! errors. This crate translates between the two.
//!
//! Architecture:
//! - `engine`: the procedure interface as a family of traits, one per concern.
//!   Any type implementing all of them is an `Engine`.
//! - `handle`: session, statement and LOB handles as newtypes over raw bits.
//! - `probe`: probe-then-grow fetching with a 128-byte inline first pass.
//! - `lob`: chunked LOB reads and writes bounded by the `TransferPolicy`.
//! - `gate`: the null predicate consulted before every typed fetch.
//! - `alloc`: the allocator capability, including `FaultInjector` for
//!   driving out-of-memory paths in tests.
//! - `bridge`: `Bridge`, the host-facing surface tying the above together.
//!
//! Enable the `native` feature to link `libmimerapi` and use `NativeEngine`.
//!

pub mod alloc;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod handle;
pub mod lob;
pub mod probe;
pub mod status;
pub mod value;
pub mod version;

#[cfg(feature = "native")]
pub mod native;

pub use alloc::{BufferAllocator, FaultInjector, SystemAllocator};
pub use bridge::{Bridge, LastError, SqlString};
pub use config::{parse_config, parse_config_str, BridgeConfig, SessionConfig, TransferPolicy};
pub use engine::{
    CursorMode, Engine, LobApi, LobKind, NullApi, ScalarApi, SessionApi, StatementApi, TransactionEnd,
    VarlenApi,
};
pub use error::BridgeError;
pub use handle::{LobHandle, RawHandle, SessionHandle, StatementHandle};
pub use probe::{Probed, INLINE_CAPACITY};
pub use status::{ErrorClass, Fetched, Status, FETCH_NO_DATA};
pub use value::{TypeFamily, Value};
pub use version::{ApiVersion, FeatureLevel, MIN_SUPPORTED};

#[cfg(feature = "native")]
pub use native::NativeEngine;
