//!
//! Engine Procedure Interface
//!
//! The fixed, C-shaped call surface of the SQL engine. Every method maps
//! one-to-one onto an engine entry point: handles go in and out as opaque
//! bits, output lands in caller-supplied buffers or out-parameters, and the
//! return value is the engine's signed status.
//!
//! The surface is split by concern so that each component of the bridge
//! names only the slice it drives:
//! - `SessionApi`: sessions, transactions, direct execution, diagnostics
//! - `StatementApi`: statements, cursors, execution, metadata
//! - `NullApi`: the null predicate and set-null
//! - `ScalarApi`: fixed-size typed values
//! - `VarlenApi`: strings and binary through fixed buffers
//! - `LobApi`: LOB negotiation and chunk transfer
//!
//! ## Buffer contract
//!
//! `get_string`, `parameter_name`, `column_name` and `get_error` write a
//! NUL-terminated value and return its full length in bytes. A return
//! value greater than or equal to the buffer length means the value was
//! truncated. `get_binary` returns the full length the same way, without a
//! terminator.
//!
//! ## LOB contract
//!
//! `get_blob_data` and `get_nclob_data` fill up to `buf.len()` bytes and
//! return the number of bytes that remained in the LOB before the call. A
//! return value larger than `buf.len()` means more data follows.
//!

use crate::handle::{LobHandle, RawHandle, SessionHandle, StatementHandle};

/// LOB flavour declared when a write is negotiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LobKind {
    Blob,
    Nclob,
}

/// How a transaction ends. Open cursors are closed either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum TransactionEnd {
    Commit = 0,
    Rollback = 1,
}

/// Cursor mode requested when a statement is prepared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(i32)]
pub enum CursorMode {
    #[default]
    ForwardOnly = 0,
    Scrollable = 1,
}

pub trait SessionApi {
    fn api_version(&self) -> String;

    fn begin_session(
        &mut self,
        database: &str,
        user: &str,
        password: &str,
        session: &mut SessionHandle,
    ) -> i32;

    /// Ends the session, rolling back any active transaction.
    fn end_session(&mut self, session: SessionHandle) -> i32;

    fn begin_transaction(&mut self, session: SessionHandle) -> i32;

    fn end_transaction(&mut self, session: SessionHandle, end: TransactionEnd) -> i32;

    /// Executes a statement without parameters; returns the affected-row count.
    fn execute_statement(&mut self, session: SessionHandle, sql: &str) -> i32;

    /// Last error recorded against a session or statement handle.
    fn get_error(&mut self, handle: RawHandle, code: &mut i32, buf: &mut [u8]) -> i32;
}

pub trait StatementApi {
    fn begin_statement(
        &mut self,
        session: SessionHandle,
        sql: &str,
        mode: CursorMode,
        statement: &mut StatementHandle,
    ) -> i32;

    /// Closes the statement and any cursor open on it.
    fn end_statement(&mut self, statement: StatementHandle) -> i32;

    fn open_cursor(&mut self, statement: StatementHandle) -> i32;

    fn close_cursor(&mut self, statement: StatementHandle) -> i32;

    fn add_batch(&mut self, statement: StatementHandle) -> i32;

    /// Executes with the parameters set so far; returns the affected-row count.
    fn execute(&mut self, statement: StatementHandle) -> i32;

    /// Advances the cursor one row. Returns `FETCH_NO_DATA` past the last row.
    fn fetch(&mut self, statement: StatementHandle) -> i32;

    fn parameter_count(&mut self, statement: StatementHandle) -> i32;

    fn parameter_name(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;

    fn parameter_type(&mut self, statement: StatementHandle, index: i16) -> i32;

    fn column_count(&mut self, statement: StatementHandle) -> i32;

    fn column_name(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;

    fn column_type(&mut self, statement: StatementHandle, index: i16) -> i32;
}

pub trait NullApi {
    /// Positive when the value is SQL null, zero when it is not.
    fn is_null(&mut self, statement: StatementHandle, index: i16) -> i32;

    fn set_null(&mut self, statement: StatementHandle, index: i16) -> i32;
}

pub trait ScalarApi {
    fn get_int32(&mut self, statement: StatementHandle, index: i16, value: &mut i32) -> i32;
    fn get_int64(&mut self, statement: StatementHandle, index: i16, value: &mut i64) -> i32;
    fn get_double(&mut self, statement: StatementHandle, index: i16, value: &mut f64) -> i32;
    fn get_float(&mut self, statement: StatementHandle, index: i16, value: &mut f32) -> i32;
    /// Returns 1 for true, 0 for false, negative on error.
    fn get_boolean(&mut self, statement: StatementHandle, index: i16) -> i32;
    fn get_uuid(&mut self, statement: StatementHandle, index: i16, value: &mut [u8; 16]) -> i32;

    fn set_int32(&mut self, statement: StatementHandle, index: i16, value: i32) -> i32;
    fn set_int64(&mut self, statement: StatementHandle, index: i16, value: i64) -> i32;
    fn set_double(&mut self, statement: StatementHandle, index: i16, value: f64) -> i32;
    fn set_float(&mut self, statement: StatementHandle, index: i16, value: f32) -> i32;
    fn set_boolean(&mut self, statement: StatementHandle, index: i16, value: bool) -> i32;
    fn set_uuid(&mut self, statement: StatementHandle, index: i16, value: &[u8; 16]) -> i32;
}

pub trait VarlenApi {
    fn get_string(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;
    fn get_binary(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;

    fn set_string(&mut self, statement: StatementHandle, index: i16, value: &str) -> i32;
    fn set_binary(&mut self, statement: StatementHandle, index: i16, value: &[u8]) -> i32;
}

pub trait LobApi {
    /// Declares a LOB of `length` bytes for a parameter and opens a write
    /// handle. A zero length binds the empty value of `kind` at once.
    fn set_lob(
        &mut self,
        statement: StatementHandle,
        index: i16,
        length: usize,
        kind: LobKind,
        lob: &mut LobHandle,
    ) -> i32;

    fn set_blob_data(&mut self, lob: &mut LobHandle, data: &[u8]) -> i32;

    /// Writes UTF-8 encoded character data.
    fn set_nclob_data(&mut self, lob: &mut LobHandle, data: &[u8]) -> i32;

    /// Opens a read handle. `length` is in bytes for binary LOBs and in
    /// characters for character LOBs.
    fn get_lob(
        &mut self,
        statement: StatementHandle,
        index: i16,
        length: &mut usize,
        lob: &mut LobHandle,
    ) -> i32;

    fn get_blob_data(&mut self, lob: &mut LobHandle, buf: &mut [u8]) -> i32;

    /// Reads UTF-8 encoded character data.
    fn get_nclob_data(&mut self, lob: &mut LobHandle, buf: &mut [u8]) -> i32;
}

/// The complete procedure interface.
pub trait Engine: SessionApi + StatementApi + NullApi + ScalarApi + VarlenApi + LobApi {}

impl<T> Engine for T where T: SessionApi + StatementApi + NullApi + ScalarApi + VarlenApi + LobApi {}
