///
/// Mimer SQL Reference Engine
///
/// An in-process implementation of the Mimer SQL procedure interface over
/// SQLite (rusqlite with bundled SQLite, so there is no system dependency).
/// It lets the bridge run end to end without the Mimer client library.
///
/// Architecture:
/// - Sessions, statements and LOB transfers are stored in registries keyed
///   by the ids handed out as handles.
/// - Result sets are materialized into rows when a cursor opens.
/// - Every failure is recorded against its handle for `get_error`.
///
/// Differences from a real Mimer server:
/// - user and password are accepted without authentication
/// - scrollable cursors are accepted but only move forward
/// - parameter types are inferred from bound values
///

pub mod engine;
pub mod error;
pub mod registry;
pub mod types;

pub use engine::{SqliteEngine, API_VERSION};
pub use error::Failure;
