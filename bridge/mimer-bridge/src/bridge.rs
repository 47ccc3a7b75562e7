//!
//! # Host-Facing Bridge
//!
//! `Bridge` wraps an engine and exposes the procedure interface with
//! growable results. Buffer negotiation, LOB chunking and the null gate
//! are handled here, so callers never size a buffer or hold a LOB handle.
//!
//! Every fetch returns `Fetched<T>`. Every call that only reports success
//! returns `Status`. Nothing here panics on engine failure.
//!
//! ## Deferred bind errors
//!
//! A setter that rejects its input (a UUID that is not 16 bytes) returns
//! `DATA_CONVERSION` immediately and also records it against the
//! statement and parameter index. A later successful bind to the same
//! index clears the record. The next `add_batch` or `execute` on that
//! statement returns the status recorded for the lowest index without
//! calling the engine, so a host that ignores setter results still never
//! runs a statement with a missing parameter. That call consumes every
//! record of the statement; `end_statement` drops them too.
//!

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::alloc::{BufferAllocator, SystemAllocator};
use crate::config::TransferPolicy;
use crate::engine::{CursorMode, Engine, TransactionEnd};
use crate::error::BridgeError;
use crate::gate::gated;
use crate::handle::{RawHandle, SessionHandle, StatementHandle};
use crate::lob;
use crate::probe::{probe, Growth, Probed};
use crate::status::{Fetched, Status, FETCH_NO_DATA};
use crate::value::{TypeFamily, Value};
use crate::version::ApiVersion;

/// Fixed capacity of an engine error message, terminator included.
pub const ERROR_MESSAGE_CAPACITY: usize = 128;

/// UTF-8 text fetched through the probe. Short values stay inline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlString(Probed);

impl SqlString {
    fn decode(bytes: Probed) -> Result<SqlString, Status> {
        match std::str::from_utf8(&bytes) {
            Ok(_) => Ok(SqlString(bytes)),
            Err(_) => Err(Status::DATA_CONVERSION),
        }
    }

    pub fn as_str(&self) -> &str {
        // validated in `decode`
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn is_inline(&self) -> bool {
        self.0.is_inline()
    }

    pub fn into_string(self) -> String {
        String::from_utf8(self.0.into_vec()).unwrap_or_default()
    }
}

impl std::ops::Deref for SqlString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for SqlString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Last error recorded against a handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LastError {
    pub code: i32,
    pub message: String,
}

pub struct Bridge<E, A = SystemAllocator> {
    engine: E,
    alloc: A,
    policy: TransferPolicy,
    pending: HashMap<(StatementHandle, i16), Status>,
}

impl<E: Engine> Bridge<E, SystemAllocator> {
    pub fn new(engine: E) -> Self {
        Self::with_allocator(engine, SystemAllocator, TransferPolicy::default())
    }
}

impl<E: Engine, A: BufferAllocator> Bridge<E, A> {
    pub fn with_allocator(engine: E, alloc: A, policy: TransferPolicy) -> Self {
        Bridge {
            engine,
            alloc,
            policy,
            pending: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    // ========================================================================
    // Sessions and transactions
    // ========================================================================

    pub fn api_version_string(&self) -> String {
        self.engine.api_version()
    }

    /// Parses the engine's version and rejects engines older than 11.0.5A.
    pub fn negotiate_version(&self) -> Result<ApiVersion, BridgeError> {
        let text = self.engine.api_version();
        let version = ApiVersion::require_supported(&text)?;
        debug!(%version, "engine API version accepted");
        Ok(version)
    }

    pub fn begin_session(&mut self, database: &str, user: &str, password: &str) -> Fetched<SessionHandle> {
        let mut session = SessionHandle::NULL;
        let rc = self.engine.begin_session(database, user, password, &mut session);
        if rc < 0 {
            return Fetched::failed(rc);
        }
        debug!(%session, database, "session started");
        Fetched::ok(session)
    }

    pub fn end_session(&mut self, session: SessionHandle) -> Status {
        Status::from_code(self.engine.end_session(session))
    }

    pub fn begin_transaction(&mut self, session: SessionHandle) -> Status {
        Status::from_code(self.engine.begin_transaction(session))
    }

    pub fn end_transaction(&mut self, session: SessionHandle, end: TransactionEnd) -> Status {
        Status::from_code(self.engine.end_transaction(session, end))
    }

    pub fn commit(&mut self, session: SessionHandle) -> Status {
        self.end_transaction(session, TransactionEnd::Commit)
    }

    pub fn rollback(&mut self, session: SessionHandle) -> Status {
        self.end_transaction(session, TransactionEnd::Rollback)
    }

    /// Executes `sql` without parameters. A positive status is the affected-row count.
    pub fn execute_statement(&mut self, session: SessionHandle, sql: &str) -> Status {
        Status::from_code(self.engine.execute_statement(session, sql))
    }

    /// Code and message of the last error on `handle`. The null handle has
    /// no error and is answered without calling the engine.
    pub fn last_error(&mut self, handle: impl Into<RawHandle>) -> Fetched<LastError> {
        let handle = handle.into();
        if handle.is_null() {
            return Fetched::ok(LastError::default());
        }
        let mut code = 0;
        let mut buf = [0u8; ERROR_MESSAGE_CAPACITY];
        let rc = self.engine.get_error(handle, &mut code, &mut buf);
        if rc < 0 {
            return Fetched::failed(rc);
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Fetched::ok(LastError {
            code,
            message: String::from_utf8_lossy(&buf[..end]).into_owned(),
        })
    }

    // ========================================================================
    // Statements and cursors
    // ========================================================================

    pub fn begin_statement(
        &mut self,
        session: SessionHandle,
        sql: &str,
        mode: CursorMode,
    ) -> Fetched<StatementHandle> {
        let mut statement = StatementHandle::NULL;
        let rc = self.engine.begin_statement(session, sql, mode, &mut statement);
        if rc < 0 {
            return Fetched::failed(rc);
        }
        Fetched::ok(statement)
    }

    pub fn end_statement(&mut self, statement: StatementHandle) -> Status {
        self.pending.retain(|(owner, _), _| *owner != statement);
        Status::from_code(self.engine.end_statement(statement))
    }

    pub fn open_cursor(&mut self, statement: StatementHandle) -> Status {
        Status::from_code(self.engine.open_cursor(statement))
    }

    pub fn close_cursor(&mut self, statement: StatementHandle) -> Status {
        Status::from_code(self.engine.close_cursor(statement))
    }

    pub fn add_batch(&mut self, statement: StatementHandle) -> Status {
        if let Some(status) = self.take_pending(statement) {
            return status;
        }
        Status::from_code(self.engine.add_batch(statement))
    }

    /// Executes with the bound parameters. A positive status is the affected-row count.
    pub fn execute(&mut self, statement: StatementHandle) -> Status {
        if let Some(status) = self.take_pending(statement) {
            return status;
        }
        Status::from_code(self.engine.execute(statement))
    }

    /// Advances the cursor. The payload is `false` once the rows are exhausted.
    pub fn fetch(&mut self, statement: StatementHandle) -> Fetched<bool> {
        match self.engine.fetch(statement) {
            rc if rc < 0 => Fetched::failed(rc),
            FETCH_NO_DATA => Fetched::ok(false),
            _ => Fetched::ok(true),
        }
    }

    fn take_pending(&mut self, statement: StatementHandle) -> Option<Status> {
        let index = self
            .pending
            .keys()
            .filter(|(owner, _)| *owner == statement)
            .map(|(_, index)| *index)
            .min()?;
        let status = self.pending.remove(&(statement, index))?;
        self.pending.retain(|(owner, _), _| *owner != statement);
        debug!(%statement, index, %status, "returning deferred bind error");
        Some(status)
    }

    fn defer(&mut self, statement: StatementHandle, index: i16, status: Status) -> Status {
        self.pending.insert((statement, index), status);
        status
    }

    /// Result of a setter; success clears any error deferred for the index.
    fn bound(&mut self, statement: StatementHandle, index: i16, status: impl Into<Status>) -> Status {
        let status = status.into();
        if status.is_ok() {
            self.pending.remove(&(statement, index));
        }
        status
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn parameter_count(&mut self, statement: StatementHandle) -> Fetched<usize> {
        count(self.engine.parameter_count(statement))
    }

    pub fn column_count(&mut self, statement: StatementHandle) -> Fetched<usize> {
        count(self.engine.column_count(statement))
    }

    pub fn parameter_type(&mut self, statement: StatementHandle, index: i16) -> Fetched<i32> {
        type_code(self.engine.parameter_type(statement, index))
    }

    pub fn column_type(&mut self, statement: StatementHandle, index: i16) -> Fetched<i32> {
        type_code(self.engine.column_type(statement, index))
    }

    pub fn parameter_name(&mut self, statement: StatementHandle, index: i16) -> Fetched<SqlString> {
        let engine = &mut self.engine;
        let probed = probe(&self.alloc, Growth::TEXT, |buf| engine.parameter_name(statement, index, buf));
        decode_text(probed)
    }

    pub fn column_name(&mut self, statement: StatementHandle, index: i16) -> Fetched<SqlString> {
        let engine = &mut self.engine;
        let probed = probe(&self.alloc, Growth::TEXT, |buf| engine.column_name(statement, index, buf));
        decode_text(probed)
    }

    // ========================================================================
    // Nulls
    // ========================================================================

    pub fn is_null(&mut self, statement: StatementHandle, index: i16) -> Fetched<bool> {
        let rc = self.engine.is_null(statement, index);
        if rc < 0 {
            return Fetched::failed(rc);
        }
        Fetched::ok(rc > 0)
    }

    pub fn set_null(&mut self, statement: StatementHandle, index: i16) -> Status {
        let rc = self.engine.set_null(statement, index);
        self.bound(statement, index, rc)
    }

    // ========================================================================
    // Fixed-size values
    // ========================================================================

    fn scalar<T, F>(&mut self, statement: StatementHandle, index: i16, get: F) -> Fetched<T>
    where
        T: Default,
        F: FnOnce(&mut E, &mut T) -> i32,
    {
        gated(&mut self.engine, statement, index, |engine| {
            let mut value = T::default();
            let rc = get(engine, &mut value);
            if rc < 0 {
                return Fetched::failed(rc);
            }
            Fetched::ok(value)
        })
    }

    pub fn get_int32(&mut self, statement: StatementHandle, index: i16) -> Fetched<i32> {
        self.scalar(statement, index, |e, v| e.get_int32(statement, index, v))
    }

    pub fn get_int64(&mut self, statement: StatementHandle, index: i16) -> Fetched<i64> {
        self.scalar(statement, index, |e, v| e.get_int64(statement, index, v))
    }

    pub fn get_double(&mut self, statement: StatementHandle, index: i16) -> Fetched<f64> {
        self.scalar(statement, index, |e, v| e.get_double(statement, index, v))
    }

    pub fn get_float(&mut self, statement: StatementHandle, index: i16) -> Fetched<f32> {
        self.scalar(statement, index, |e, v| e.get_float(statement, index, v))
    }

    pub fn get_boolean(&mut self, statement: StatementHandle, index: i16) -> Fetched<bool> {
        gated(&mut self.engine, statement, index, |engine| {
            match engine.get_boolean(statement, index) {
                rc if rc < 0 => Fetched::failed(rc),
                rc => Fetched::ok(rc != 0),
            }
        })
    }

    pub fn get_uuid(&mut self, statement: StatementHandle, index: i16) -> Fetched<uuid::Uuid> {
        self.scalar(statement, index, |e, v: &mut [u8; 16]| e.get_uuid(statement, index, v))
            .map(uuid::Uuid::from_bytes)
    }

    pub fn set_int32(&mut self, statement: StatementHandle, index: i16, value: i32) -> Status {
        let rc = self.engine.set_int32(statement, index, value);
        self.bound(statement, index, rc)
    }

    pub fn set_int64(&mut self, statement: StatementHandle, index: i16, value: i64) -> Status {
        let rc = self.engine.set_int64(statement, index, value);
        self.bound(statement, index, rc)
    }

    pub fn set_double(&mut self, statement: StatementHandle, index: i16, value: f64) -> Status {
        let rc = self.engine.set_double(statement, index, value);
        self.bound(statement, index, rc)
    }

    pub fn set_float(&mut self, statement: StatementHandle, index: i16, value: f32) -> Status {
        let rc = self.engine.set_float(statement, index, value);
        self.bound(statement, index, rc)
    }

    pub fn set_boolean(&mut self, statement: StatementHandle, index: i16, value: bool) -> Status {
        let rc = self.engine.set_boolean(statement, index, value);
        self.bound(statement, index, rc)
    }

    /// Binds a UUID given as raw bytes. Anything other than 16 bytes is
    /// rejected without calling the engine.
    pub fn set_uuid(&mut self, statement: StatementHandle, index: i16, value: &[u8]) -> Status {
        let Ok(bytes) = <&[u8; 16]>::try_from(value) else {
            warn!(%statement, index, len = value.len(), "UUID parameter is not 16 bytes");
            return self.defer(statement, index, Status::DATA_CONVERSION);
        };
        let rc = self.engine.set_uuid(statement, index, bytes);
        self.bound(statement, index, rc)
    }

    // ========================================================================
    // Variable-length values
    // ========================================================================

    pub fn get_string(&mut self, statement: StatementHandle, index: i16) -> Fetched<SqlString> {
        let alloc = &self.alloc;
        let fetched = gated(&mut self.engine, statement, index, |engine| {
            probe(alloc, Growth::TEXT, |buf| engine.get_string(statement, index, buf))
        });
        decode_text(fetched)
    }

    pub fn get_binary(&mut self, statement: StatementHandle, index: i16) -> Fetched<Probed> {
        let alloc = &self.alloc;
        gated(&mut self.engine, statement, index, |engine| {
            probe(alloc, Growth::BINARY, |buf| engine.get_binary(statement, index, buf))
        })
    }

    pub fn set_string(&mut self, statement: StatementHandle, index: i16, value: &str) -> Status {
        let rc = self.engine.set_string(statement, index, value);
        self.bound(statement, index, rc)
    }

    pub fn set_binary(&mut self, statement: StatementHandle, index: i16, value: &[u8]) -> Status {
        let rc = self.engine.set_binary(statement, index, value);
        self.bound(statement, index, rc)
    }

    // ========================================================================
    // LOBs
    // ========================================================================

    pub fn get_blob(&mut self, statement: StatementHandle, index: i16) -> Fetched<Vec<u8>> {
        let (alloc, policy) = (&self.alloc, &self.policy);
        gated(&mut self.engine, statement, index, |engine| {
            lob::read_blob(engine, alloc, policy, statement, index)
        })
    }

    pub fn get_nclob(&mut self, statement: StatementHandle, index: i16) -> Fetched<String> {
        let (alloc, policy) = (&self.alloc, &self.policy);
        gated(&mut self.engine, statement, index, |engine| {
            lob::read_nclob(engine, alloc, policy, statement, index)
        })
    }

    /// Binds a binary LOB; `None` binds SQL null.
    pub fn set_blob(&mut self, statement: StatementHandle, index: i16, payload: Option<&[u8]>) -> Status {
        let status = lob::write_blob(&mut self.engine, &self.policy, statement, index, payload);
        self.bound(statement, index, status)
    }

    /// Binds a character LOB; `None` binds SQL null.
    pub fn set_nclob(&mut self, statement: StatementHandle, index: i16, payload: Option<&str>) -> Status {
        let status = lob::write_nclob(&mut self.engine, &self.policy, statement, index, payload);
        self.bound(statement, index, status)
    }

    // ========================================================================
    // Dynamic dispatch by column type
    // ========================================================================

    /// Reads a column through the accessor matching its engine type.
    /// SQL null becomes `Value::Null`.
    pub fn get_value(&mut self, statement: StatementHandle, index: i16) -> Fetched<Value> {
        let code = self.engine.column_type(statement, index);
        if code < 0 {
            return Fetched::failed(code);
        }
        let Some(family) = TypeFamily::from_code(code) else {
            warn!(%statement, index, code, "no accessor for column type");
            return Fetched::failed(Status::DATA_CONVERSION);
        };
        let fetched = match family {
            TypeFamily::Text => self.get_string(statement, index).map(|s| Value::Text(s.into_string())),
            TypeFamily::Int32 => self.get_int32(statement, index).map(Value::Int32),
            TypeFamily::Int64 => self.get_int64(statement, index).map(Value::Int64),
            TypeFamily::Double => self.get_double(statement, index).map(Value::Double),
            TypeFamily::Binary => self.get_binary(statement, index).map(|b| Value::Binary(b.into_vec())),
            TypeFamily::Boolean => self.get_boolean(statement, index).map(Value::Boolean),
            TypeFamily::Blob => self.get_blob(statement, index).map(Value::Binary),
            TypeFamily::Nclob => self.get_nclob(statement, index).map(Value::Text),
            TypeFamily::Uuid => self.get_uuid(statement, index).map(Value::Uuid),
        };
        if fetched.is_null() {
            return Fetched::ok(Value::Null);
        }
        fetched
    }
}

fn count(rc: i32) -> Fetched<usize> {
    if rc < 0 {
        return Fetched::failed(rc);
    }
    Fetched::ok(rc as usize)
}

fn type_code(rc: i32) -> Fetched<i32> {
    if rc < 0 {
        return Fetched::failed(rc);
    }
    Fetched::ok(rc)
}

fn decode_text(fetched: Fetched<Probed>) -> Fetched<SqlString> {
    let Some(bytes) = fetched.value else {
        return Fetched {
            status: fetched.status,
            value: None,
        };
    };
    match SqlString::decode(bytes) {
        Ok(text) => Fetched::ok(text),
        Err(status) => Fetched::failed(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::FaultInjector;
    use crate::engine::{LobApi, LobKind, NullApi, ScalarApi, SessionApi, StatementApi, VarlenApi};
    use crate::handle::LobHandle;
    use crate::probe::INLINE_CAPACITY;

    /// One-row engine with fixed column contents, counting calls per entry point.
    #[derive(Default)]
    struct Scripted {
        text: Vec<Option<Vec<u8>>>,
        calls: HashMap<&'static str, usize>,
        uuid_bound: Option<[u8; 16]>,
        executed: usize,
    }

    impl Scripted {
        fn with_text(values: &[Option<&[u8]>]) -> Self {
            Scripted {
                text: values.iter().map(|v| v.map(|b| b.to_vec())).collect(),
                ..Default::default()
            }
        }

        fn hit(&mut self, name: &'static str) {
            *self.calls.entry(name).or_default() += 1;
        }

        fn calls(&self, name: &str) -> usize {
            self.calls.get(name).copied().unwrap_or(0)
        }

        fn column(&self, index: i16) -> Option<&Option<Vec<u8>>> {
            self.text.get((index as usize).checked_sub(1)?)
        }
    }

    impl SessionApi for Scripted {
        fn api_version(&self) -> String {
            "11.0.5A".to_string()
        }
        fn begin_session(&mut self, _: &str, _: &str, _: &str, session: &mut SessionHandle) -> i32 {
            *session = SessionHandle::from_bits(0x51);
            0
        }
        fn end_session(&mut self, _: SessionHandle) -> i32 {
            0
        }
        fn begin_transaction(&mut self, _: SessionHandle) -> i32 {
            0
        }
        fn end_transaction(&mut self, _: SessionHandle, _: TransactionEnd) -> i32 {
            0
        }
        fn execute_statement(&mut self, _: SessionHandle, _: &str) -> i32 {
            1
        }
        fn get_error(&mut self, _: RawHandle, code: &mut i32, buf: &mut [u8]) -> i32 {
            self.hit("get_error");
            let message = b"Table BANK not found";
            *code = -12200;
            buf[..message.len()].copy_from_slice(message);
            buf[message.len()] = 0;
            message.len() as i32
        }
    }

    impl StatementApi for Scripted {
        fn begin_statement(&mut self, _: SessionHandle, _: &str, _: CursorMode, s: &mut StatementHandle) -> i32 {
            *s = StatementHandle::from_bits(0x52);
            0
        }
        fn end_statement(&mut self, _: StatementHandle) -> i32 {
            0
        }
        fn open_cursor(&mut self, _: StatementHandle) -> i32 {
            0
        }
        fn close_cursor(&mut self, _: StatementHandle) -> i32 {
            0
        }
        fn add_batch(&mut self, _: StatementHandle) -> i32 {
            self.hit("add_batch");
            0
        }
        fn execute(&mut self, _: StatementHandle) -> i32 {
            self.executed += 1;
            1
        }
        fn fetch(&mut self, _: StatementHandle) -> i32 {
            self.hit("fetch");
            if self.calls("fetch") == 1 { 0 } else { FETCH_NO_DATA }
        }
        fn parameter_count(&mut self, _: StatementHandle) -> i32 {
            1
        }
        fn parameter_name(&mut self, _: StatementHandle, _: i16, buf: &mut [u8]) -> i32 {
            write_text(buf, b"id")
        }
        fn parameter_type(&mut self, _: StatementHandle, _: i16) -> i32 {
            crate::value::codes::UUID
        }
        fn column_count(&mut self, _: StatementHandle) -> i32 {
            self.text.len() as i32
        }
        fn column_name(&mut self, _: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
            let name = format!("column_{}", index);
            write_text(buf, name.as_bytes())
        }
        fn column_type(&mut self, _: StatementHandle, index: i16) -> i32 {
            match self.column(index) {
                Some(_) => crate::value::codes::CHARACTER_VARYING,
                None => -24102,
            }
        }
    }

    impl NullApi for Scripted {
        fn is_null(&mut self, _: StatementHandle, index: i16) -> i32 {
            self.hit("is_null");
            match self.column(index) {
                Some(None) => 1,
                Some(Some(_)) => 0,
                None => -24102,
            }
        }
        fn set_null(&mut self, _: StatementHandle, _: i16) -> i32 {
            0
        }
    }

    impl ScalarApi for Scripted {
        fn get_int32(&mut self, _: StatementHandle, _: i16, v: &mut i32) -> i32 {
            self.hit("get_int32");
            *v = 42;
            0
        }
        fn get_int64(&mut self, _: StatementHandle, _: i16, v: &mut i64) -> i32 {
            *v = 1 << 40;
            0
        }
        fn get_double(&mut self, _: StatementHandle, _: i16, v: &mut f64) -> i32 {
            *v = 0.5;
            0
        }
        fn get_float(&mut self, _: StatementHandle, _: i16, v: &mut f32) -> i32 {
            *v = 0.25;
            0
        }
        fn get_boolean(&mut self, _: StatementHandle, _: i16) -> i32 {
            1
        }
        fn get_uuid(&mut self, _: StatementHandle, _: i16, v: &mut [u8; 16]) -> i32 {
            *v = [0xab; 16];
            0
        }
        fn set_int32(&mut self, _: StatementHandle, _: i16, _: i32) -> i32 {
            0
        }
        fn set_int64(&mut self, _: StatementHandle, _: i16, _: i64) -> i32 {
            0
        }
        fn set_double(&mut self, _: StatementHandle, _: i16, _: f64) -> i32 {
            0
        }
        fn set_float(&mut self, _: StatementHandle, _: i16, _: f32) -> i32 {
            0
        }
        fn set_boolean(&mut self, _: StatementHandle, _: i16, _: bool) -> i32 {
            0
        }
        fn set_uuid(&mut self, _: StatementHandle, _: i16, v: &[u8; 16]) -> i32 {
            self.hit("set_uuid");
            self.uuid_bound = Some(*v);
            0
        }
    }

    impl VarlenApi for Scripted {
        fn get_string(&mut self, _: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
            self.hit("get_string");
            match self.column(index) {
                Some(Some(value)) => {
                    let value = value.clone();
                    write_text(buf, &value)
                }
                _ => -24102,
            }
        }
        fn get_binary(&mut self, _: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
            self.hit("get_binary");
            match self.column(index) {
                Some(Some(value)) => {
                    let n = value.len().min(buf.len());
                    buf[..n].copy_from_slice(&value[..n]);
                    value.len() as i32
                }
                _ => -24102,
            }
        }
        fn set_string(&mut self, _: StatementHandle, _: i16, _: &str) -> i32 {
            0
        }
        fn set_binary(&mut self, _: StatementHandle, _: i16, _: &[u8]) -> i32 {
            0
        }
    }

    impl LobApi for Scripted {
        fn set_lob(&mut self, _: StatementHandle, _: i16, _: usize, _: LobKind, _: &mut LobHandle) -> i32 {
            -16101
        }
        fn set_blob_data(&mut self, _: &mut LobHandle, _: &[u8]) -> i32 {
            -16101
        }
        fn set_nclob_data(&mut self, _: &mut LobHandle, _: &[u8]) -> i32 {
            -16101
        }
        fn get_lob(&mut self, _: StatementHandle, _: i16, _: &mut usize, _: &mut LobHandle) -> i32 {
            self.hit("get_lob");
            -16101
        }
        fn get_blob_data(&mut self, _: &mut LobHandle, _: &mut [u8]) -> i32 {
            -16101
        }
        fn get_nclob_data(&mut self, _: &mut LobHandle, _: &mut [u8]) -> i32 {
            -16101
        }
    }

    fn write_text(buf: &mut [u8], value: &[u8]) -> i32 {
        if !buf.is_empty() {
            let n = value.len().min(buf.len() - 1);
            buf[..n].copy_from_slice(&value[..n]);
            buf[n] = 0;
        }
        value.len() as i32
    }

    const STMT: StatementHandle = StatementHandle::from_bits(0x52);

    #[test]
    fn test_string_fetch_inline_and_grown() {
        let long = vec![b'm'; 300];
        let mut bridge = Bridge::new(Scripted::with_text(&[Some(&b"short"[..]), Some(long.as_slice())]));

        let short = bridge.get_string(STMT, 1).value.unwrap();
        assert_eq!(short, "short");
        assert!(short.is_inline());

        let grown = bridge.get_string(STMT, 2).value.unwrap();
        assert_eq!(grown.len(), 300);
        assert!(!grown.is_inline());
        assert_eq!(bridge.engine().calls("get_string"), 3);
    }

    #[test]
    fn test_null_gate_skips_accessor() {
        let mut bridge = Bridge::new(Scripted::with_text(&[None]));

        let fetched = bridge.get_string(STMT, 1);
        assert!(fetched.is_null());
        let fetched = bridge.get_int32(STMT, 1);
        assert!(fetched.is_null());
        let fetched = bridge.get_binary(STMT, 1);
        assert!(fetched.is_null());
        let fetched = bridge.get_blob(STMT, 1);
        assert!(fetched.is_null());

        let engine = bridge.engine();
        assert_eq!(engine.calls("is_null"), 4);
        assert_eq!(engine.calls("get_string"), 0);
        assert_eq!(engine.calls("get_int32"), 0);
        assert_eq!(engine.calls("get_binary"), 0);
        assert_eq!(engine.calls("get_lob"), 0);
    }

    #[test]
    fn test_invalid_utf8_is_data_conversion() {
        let mut bridge = Bridge::new(Scripted::with_text(&[Some(&[0xff, 0xfe, b'a'][..])]));
        let fetched = bridge.get_string(STMT, 1);
        assert_eq!(fetched.status, Status::DATA_CONVERSION);
        assert!(fetched.value.is_none());
    }

    #[test]
    fn test_failing_allocator_on_growth_path() {
        let long = vec![b'x'; INLINE_CAPACITY * 2];
        let mut bridge = Bridge::with_allocator(
            Scripted::with_text(&[Some(&b"ok"[..]), Some(long.as_slice())]),
            FaultInjector::failing(),
            TransferPolicy::default(),
        );

        assert_eq!(bridge.get_string(STMT, 1).value.unwrap(), "ok");
        let fetched = bridge.get_string(STMT, 2);
        assert_eq!(fetched.status, Status::OUT_OF_MEMORY);
        assert!(fetched.value.is_none());
        let fetched = bridge.get_binary(STMT, 2);
        assert_eq!(fetched.status, Status::OUT_OF_MEMORY);
        assert_eq!(bridge.allocator().denied(), 2);

        bridge.allocator().set_failing(false);
        assert_eq!(bridge.get_string(STMT, 2).value.unwrap().len(), long.len());
    }

    #[test]
    fn test_uuid_length_is_validated() {
        let mut bridge = Bridge::new(Scripted::default());

        let status = bridge.set_uuid(STMT, 1, &[1, 2, 3]);
        assert_eq!(status, Status::DATA_CONVERSION);
        assert_eq!(bridge.engine().calls("set_uuid"), 0);

        let status = bridge.set_uuid(STMT, 1, &[7; 16]);
        assert_eq!(status, Status::OK);
        assert_eq!(bridge.engine().uuid_bound, Some([7; 16]));
    }

    #[test]
    fn test_deferred_bind_error_blocks_execute_once() {
        let mut bridge = Bridge::new(Scripted::default());
        bridge.set_uuid(STMT, 1, &[0; 15]);

        assert_eq!(bridge.execute(STMT), Status::DATA_CONVERSION);
        assert_eq!(bridge.engine().executed, 0);
        assert_eq!(bridge.execute(STMT).row_count(), Some(1));
        assert_eq!(bridge.engine().executed, 1);

        bridge.set_uuid(STMT, 1, &[0; 17]);
        assert_eq!(bridge.add_batch(STMT), Status::DATA_CONVERSION);
        assert_eq!(bridge.engine().calls("add_batch"), 0);

        bridge.set_uuid(STMT, 1, &[0; 3]);
        bridge.end_statement(STMT);
        assert_eq!(bridge.execute(STMT).row_count(), Some(1));
    }

    #[test]
    fn test_rebind_clears_deferred_error() {
        let mut bridge = Bridge::new(Scripted::default());
        assert_eq!(bridge.set_uuid(STMT, 1, &[1, 2, 3]), Status::DATA_CONVERSION);
        assert_eq!(bridge.set_uuid(STMT, 1, &[9; 16]), Status::OK);

        assert_eq!(bridge.execute(STMT).row_count(), Some(1));
        assert_eq!(bridge.engine().executed, 1);
        assert_eq!(bridge.engine().uuid_bound, Some([9; 16]));

        bridge.set_uuid(STMT, 2, &[0; 4]);
        assert_eq!(bridge.set_null(STMT, 2), Status::OK);
        assert_eq!(bridge.add_batch(STMT), Status::OK);
        assert_eq!(bridge.engine().calls("add_batch"), 1);
    }

    #[test]
    fn test_rebind_only_clears_its_own_index() {
        let mut bridge = Bridge::new(Scripted::default());
        bridge.set_uuid(STMT, 1, &[1; 3]);
        bridge.set_uuid(STMT, 2, &[2; 3]);
        assert_eq!(bridge.set_int32(STMT, 1, 7), Status::OK);

        assert_eq!(bridge.execute(STMT), Status::DATA_CONVERSION);
        assert_eq!(bridge.engine().executed, 0);
        assert_eq!(bridge.execute(STMT).row_count(), Some(1));

        bridge.set_uuid(STMT, 3, &[3; 3]);
        assert_eq!(bridge.set_uuid(STMT, 1, &[4; 16]), Status::OK);
        assert_eq!(bridge.execute(STMT), Status::DATA_CONVERSION);
    }

    #[test]
    fn test_last_error_null_handle_guard() {
        let mut bridge = Bridge::new(Scripted::default());

        let fetched = bridge.last_error(StatementHandle::NULL);
        assert_eq!(fetched.status, Status::OK);
        assert_eq!(fetched.value, Some(LastError::default()));
        assert_eq!(bridge.engine().calls("get_error"), 0);

        let err = bridge.last_error(STMT).value.unwrap();
        assert_eq!(err.code, -12200);
        insta::assert_snapshot!(err.message, @"Table BANK not found");
    }

    #[test]
    fn test_fetch_reports_end_of_rows() {
        let mut bridge = Bridge::new(Scripted::default());
        assert_eq!(bridge.fetch(STMT).value, Some(true));
        assert_eq!(bridge.fetch(STMT).value, Some(false));
    }

    #[test]
    fn test_metadata() {
        let mut bridge = Bridge::new(Scripted::with_text(&[Some(&b"a"[..]), Some(&b"b"[..])]));
        assert_eq!(bridge.column_count(STMT).value, Some(2));
        assert_eq!(bridge.column_name(STMT, 2).value.unwrap(), "column_2");
        assert_eq!(bridge.parameter_name(STMT, 1).value.unwrap(), "id");
        assert_eq!(bridge.parameter_type(STMT, 1).value, Some(crate::value::codes::UUID));
        assert_eq!(bridge.column_type(STMT, 9).status.code(), -24102);
    }

    #[test]
    fn test_scalars_and_value_dispatch() {
        let mut bridge = Bridge::new(Scripted::with_text(&[Some(&b"text"[..]), None]));
        assert_eq!(bridge.get_int64(STMT, 1).value, Some(1 << 40));
        assert_eq!(bridge.get_float(STMT, 1).value, Some(0.25));
        assert_eq!(bridge.get_boolean(STMT, 1).value, Some(true));
        assert_eq!(
            bridge.get_uuid(STMT, 1).value,
            Some(uuid::Uuid::from_bytes([0xab; 16]))
        );

        assert_eq!(bridge.get_value(STMT, 1).value, Some(Value::Text("text".to_string())));
        assert_eq!(bridge.get_value(STMT, 2).value, Some(Value::Null));
        assert_eq!(bridge.get_value(STMT, 3).status.code(), -24102);
    }

    #[test]
    fn test_session_round_trip() {
        let mut bridge = Bridge::new(Scripted::default());
        let session = bridge.begin_session("bankdb", "SYSADM", "pw").value.unwrap();
        assert_eq!(session.bits(), 0x51);
        assert_eq!(bridge.execute_statement(session, "DELETE FROM t").row_count(), Some(1));
        assert_eq!(bridge.commit(session), Status::OK);
        assert_eq!(bridge.end_session(session), Status::OK);
        assert_eq!(bridge.negotiate_version().unwrap().to_string(), "11.0.5A");
    }
}
