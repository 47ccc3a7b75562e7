///
/// SQLite implementation of the Mimer SQL procedure interface.
///
/// Uses three handle registries sharing one id counter:
/// - sessions: id → SQLite connection plus transaction flag
/// - statements: id → SQL text, parameter slots, batch, open cursor
/// - lobs: id → an in-progress LOB read or write
///
/// Statements keep their SQL and are re-prepared through the connection's
/// statement cache on every execution, so no SQLite statement outlives a
/// call. Cursors are materialized in full when opened.
///
/// Error handling follows the procedure interface: a failing call records
/// its `Failure` against the handle it was made on and returns the code.
/// `get_error` reads the record back.
///

use std::collections::HashMap;
use std::path::PathBuf;

use mimer_bridge::value::codes;
use mimer_bridge::{
    CursorMode, LobApi, LobHandle, LobKind, NullApi, RawHandle, ScalarApi, SessionApi, SessionHandle,
    StatementApi, StatementHandle, TransactionEnd, VarlenApi, FETCH_NO_DATA,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use tracing::{debug, trace};

use crate::error::{
    Failure, CONVERSION_FAILURE, CURSOR_STATE, LOB_OVERFLOW, LOB_STATE, NOT_A_QUERY,
    PARAMETER_NOT_SET, RETURNS_RESULTS, TRANSACTION_STATE,
};
use crate::registry::{IdSource, Registry};
use crate::types;

/// Procedure interface version this engine implements.
pub const API_VERSION: &str = "11.0.5B";

struct Session {
    conn: Connection,
    in_transaction: bool,
}

struct Column {
    name: String,
    type_code: i32,
    declared: bool,
}

struct Cursor {
    rows: Vec<Vec<SqlValue>>,
    position: Option<usize>,
}

impl Cursor {
    fn current(&self) -> Option<&Vec<SqlValue>> {
        self.rows.get(self.position?)
    }
}

struct Statement {
    session: u64,
    sql: String,
    parameter_names: Vec<String>,
    /// `None` until a value is bound.
    params: Vec<Option<SqlValue>>,
    batch: Vec<Vec<SqlValue>>,
    columns: Vec<Column>,
    cursor: Option<Cursor>,
}

enum LobTransfer {
    Write {
        statement: u64,
        slot: usize,
        expected: usize,
        data: Vec<u8>,
    },
    Read {
        statement: u64,
        data: Vec<u8>,
        position: usize,
    },
}

impl LobTransfer {
    fn statement(&self) -> u64 {
        match self {
            LobTransfer::Write { statement, .. } | LobTransfer::Read { statement, .. } => *statement,
        }
    }
}

pub struct SqliteEngine {
    ids: IdSource,
    sessions: Registry<Session>,
    statements: Registry<Statement>,
    lobs: Registry<LobTransfer>,
    errors: HashMap<u64, Failure>,
    root: Option<PathBuf>,
}

impl Default for SqliteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteEngine {
    /// An engine resolving database names as file paths; the empty name
    /// and `:memory:` open a private in-memory database.
    pub fn new() -> Self {
        Self {
            ids: IdSource::new(),
            sessions: Registry::new(),
            statements: Registry::new(),
            lobs: Registry::new(),
            errors: HashMap::new(),
            root: None,
        }
    }

    /// An engine resolving database `name` to `<root>/<name>.db`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::new()
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// LOB transfers negotiated but not yet completed.
    pub fn lob_count(&self) -> usize {
        self.lobs.len()
    }

    fn open(&self, database: &str) -> Result<Connection, Failure> {
        if database.is_empty() || database == ":memory:" {
            return Ok(Connection::open_in_memory()?);
        }
        let path = match &self.root {
            Some(root) => root.join(format!("{}.db", database)),
            None => PathBuf::from(database),
        };
        Ok(Connection::open(path)?)
    }

    fn report(&mut self, handle: u64, result: Result<i32, Failure>) -> i32 {
        match result {
            Ok(rc) => rc,
            Err(failure) => {
                debug!(handle, code = failure.code, message = %failure.message, "engine call failed");
                let code = failure.code;
                self.errors.insert(handle, failure);
                code
            }
        }
    }

    fn session(&self, id: u64) -> Result<&Session, Failure> {
        self.sessions
            .get(id)
            .ok_or_else(|| Failure::invalid_handle("session", id))
    }

    fn session_mut(&mut self, id: u64) -> Result<&mut Session, Failure> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| Failure::invalid_handle("session", id))
    }

    fn statement(&self, handle: StatementHandle) -> Result<&Statement, Failure> {
        self.statements
            .get(handle.bits())
            .ok_or_else(|| Failure::invalid_handle("statement", handle.bits()))
    }

    fn statement_mut(&mut self, handle: StatementHandle) -> Result<&mut Statement, Failure> {
        self.statements
            .get_mut(handle.bits())
            .ok_or_else(|| Failure::invalid_handle("statement", handle.bits()))
    }

    fn drop_statement(&mut self, id: u64) {
        self.statements.remove(id);
        for lob in self.lobs.ids_where(|lob| lob.statement() == id) {
            self.lobs.remove(lob);
        }
        self.errors.remove(&id);
    }

    fn close_session_cursors(&mut self, session: u64) {
        for statement in self.statements.values_mut() {
            if statement.session == session {
                statement.cursor = None;
            }
        }
        for statement in self.statements.ids_where(|s| s.session == session) {
            self.drop_reads(statement);
        }
    }

    /// Forgets reads on `statement` that the caller stopped draining. A read
    /// handle is only valid within the chunk loop that opened it.
    fn drop_reads(&mut self, statement: u64) {
        let abandoned = self
            .lobs
            .ids_where(|lob| matches!(lob, LobTransfer::Read { statement: owner, .. } if *owner == statement));
        for lob in abandoned {
            trace!(lob, statement, "abandoned LOB read dropped");
            self.lobs.remove(lob);
        }
    }

    fn column_value(&self, handle: StatementHandle, index: i16) -> Result<&SqlValue, Failure> {
        let statement = self.statement(handle)?;
        let slot = slot(index, statement.columns.len())?;
        let row = statement
            .cursor
            .as_ref()
            .and_then(Cursor::current)
            .ok_or_else(|| Failure::new(CURSOR_STATE, "No current row"))?;
        Ok(&row[slot])
    }

    fn non_null(&self, handle: StatementHandle, index: i16) -> Result<&SqlValue, Failure> {
        match self.column_value(handle, index)? {
            SqlValue::Null => Err(Failure::new(CONVERSION_FAILURE, "Value is NULL")),
            value => Ok(value),
        }
    }

    fn bind(&mut self, handle: StatementHandle, index: i16, value: SqlValue) -> i32 {
        self.drop_reads(handle.bits());
        let result = self.statement_mut(handle).and_then(|statement| {
            let slot = slot(index, statement.params.len())?;
            statement.params[slot] = Some(value);
            Ok(0)
        });
        self.report(handle.bits(), result)
    }

    fn try_begin_statement(&mut self, session: u64, sql: &str) -> Result<u64, Failure> {
        let entry = {
            let conn = &self.session(session)?.conn;
            let prepared = conn.prepare(sql)?;
            let parameter_names = (1..=prepared.parameter_count())
                .map(|i| {
                    prepared
                        .parameter_name(i)
                        .map(|name| name.trim_start_matches([':', '@', '$', '?']).to_string())
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>();
            let columns = prepared
                .columns()
                .iter()
                .map(|column| Column {
                    name: column.name().to_string(),
                    type_code: column
                        .decl_type()
                        .map(types::code_for_decltype)
                        .unwrap_or(codes::CHARACTER_VARYING),
                    declared: column.decl_type().is_some(),
                })
                .collect();
            Statement {
                session,
                sql: sql.to_string(),
                params: vec![None; parameter_names.len()],
                parameter_names,
                batch: Vec::new(),
                columns,
                cursor: None,
            }
        };
        Ok(self.statements.insert(&mut self.ids, entry))
    }

    fn try_open_cursor(&mut self, handle: StatementHandle) -> Result<i32, Failure> {
        let (session, sql, values) = {
            let statement = self.statement(handle)?;
            if statement.columns.is_empty() {
                return Err(Failure::new(NOT_A_QUERY, "Statement does not return a result set"));
            }
            if statement.cursor.is_some() {
                return Err(Failure::new(CURSOR_STATE, "Cursor already open"));
            }
            (statement.session, statement.sql.clone(), bound_values(&statement.params)?)
        };
        let rows = query_rows(&self.session(session)?.conn, &sql, &values)?;

        let statement = self.statement_mut(handle)?;
        for (i, column) in statement.columns.iter_mut().enumerate() {
            if column.declared {
                continue;
            }
            if let Some(value) = rows.iter().map(|row| &row[i]).find(|v| !matches!(v, SqlValue::Null)) {
                column.type_code = types::code_for_value(value);
            }
        }
        debug!(statement = handle.bits(), rows = rows.len(), "cursor opened");
        statement.cursor = Some(Cursor {
            rows,
            position: None,
        });
        Ok(0)
    }

    fn try_execute(&mut self, handle: StatementHandle) -> Result<i32, Failure> {
        let (session, sql, sets) = {
            let statement = self.statement_mut(handle)?;
            if !statement.columns.is_empty() {
                return Err(Failure::new(RETURNS_RESULTS, "Statement returns a result set; open a cursor"));
            }
            let current = bound_values(&statement.params)?;
            let mut sets = std::mem::take(&mut statement.batch);
            sets.push(current);
            (statement.session, statement.sql.clone(), sets)
        };
        let conn = &self.session(session)?.conn;

        conn.execute_batch("SAVEPOINT mimer_execute")?;
        let mut changed = 0usize;
        for values in &sets {
            match execute_update(conn, &sql, values) {
                Ok(n) => changed += n,
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK TO mimer_execute; RELEASE mimer_execute");
                    return Err(e.into());
                }
            }
        }
        conn.execute_batch("RELEASE mimer_execute")?;
        trace!(statement = handle.bits(), sets = sets.len(), changed, "statement executed");
        Ok(clamp(changed))
    }

    fn try_put_lob(&mut self, id: u64, chunk: &[u8], text: bool) -> Result<i32, Failure> {
        let complete = match self.lobs.get_mut(id) {
            Some(LobTransfer::Write { expected, data, .. }) => {
                if data.len() + chunk.len() > *expected {
                    self.lobs.remove(id);
                    return Err(Failure::new(LOB_OVERFLOW, "LOB data exceeds the declared length"));
                }
                data.extend_from_slice(chunk);
                data.len() == *expected
            }
            _ => return Err(Failure::new(LOB_STATE, "LOB handle is not open for writing")),
        };
        if !complete {
            return Ok(0);
        }

        let Some(LobTransfer::Write {
            statement,
            slot,
            data,
            ..
        }) = self.lobs.remove(id)
        else {
            return Err(Failure::new(LOB_STATE, "LOB handle is not open for writing"));
        };
        let value = if text {
            SqlValue::Text(String::from_utf8(data).map_err(|_| Failure::conversion("character LOB"))?)
        } else {
            SqlValue::Blob(data)
        };
        let entry = self
            .statements
            .get_mut(statement)
            .ok_or_else(|| Failure::invalid_handle("statement", statement))?;
        entry.params[slot] = Some(value);
        trace!(lob = id, statement, "LOB parameter complete");
        Ok(0)
    }

    fn put_lob(&mut self, lob: &mut LobHandle, chunk: &[u8], text: bool) -> i32 {
        let id = lob.bits();
        let owner = self.lobs.get(id).map(LobTransfer::statement).unwrap_or(id);
        let result = self.try_put_lob(id, chunk, text);
        self.report(owner, result)
    }

    fn take_lob(&mut self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        let id = lob.bits();
        let owner = self.lobs.get(id).map(LobTransfer::statement).unwrap_or(id);
        let result = match self.lobs.get_mut(id) {
            Some(LobTransfer::Read { data, position, .. }) => {
                let remaining = data.len() - *position;
                let n = remaining.min(buf.len());
                buf[..n].copy_from_slice(&data[*position..*position + n]);
                *position += n;
                if *position == data.len() {
                    self.lobs.remove(id);
                }
                Ok(clamp(remaining))
            }
            _ => Err(Failure::new(LOB_STATE, "LOB handle is not open for reading")),
        };
        self.report(owner, result)
    }
}

impl SessionApi for SqliteEngine {
    fn api_version(&self) -> String {
        format!("{} reference/sqlite {}", API_VERSION, rusqlite::version())
    }

    fn begin_session(
        &mut self,
        database: &str,
        user: &str,
        _password: &str,
        session: &mut SessionHandle,
    ) -> i32 {
        let result = self.open(database).map(|conn| {
            let id = self.sessions.insert(
                &mut self.ids,
                Session {
                    conn,
                    in_transaction: false,
                },
            );
            debug!(session = id, database, user, "session opened");
            *session = SessionHandle::from_bits(id);
            0
        });
        self.report(0, result)
    }

    fn end_session(&mut self, session: SessionHandle) -> i32 {
        let id = session.bits();
        let Some(entry) = self.sessions.remove(id) else {
            return self.report(id, Err(Failure::invalid_handle("session", id)));
        };
        if entry.in_transaction {
            let _ = entry.conn.execute_batch("ROLLBACK");
        }
        for statement in self.statements.ids_where(|s| s.session == id) {
            self.drop_statement(statement);
        }
        self.errors.remove(&id);
        debug!(session = id, "session closed");
        0
    }

    fn begin_transaction(&mut self, session: SessionHandle) -> i32 {
        let result = self.session_mut(session.bits()).and_then(|entry| {
            if entry.in_transaction {
                return Err(Failure::new(TRANSACTION_STATE, "Transaction already active"));
            }
            entry.conn.execute_batch("BEGIN")?;
            entry.in_transaction = true;
            Ok(0)
        });
        self.report(session.bits(), result)
    }

    fn end_transaction(&mut self, session: SessionHandle, end: TransactionEnd) -> i32 {
        let id = session.bits();
        let result = self.session_mut(id).and_then(|entry| {
            if !entry.in_transaction {
                return Err(Failure::new(TRANSACTION_STATE, "No active transaction"));
            }
            entry.in_transaction = false;
            match end {
                TransactionEnd::Commit => {
                    if let Err(e) = entry.conn.execute_batch("COMMIT") {
                        let _ = entry.conn.execute_batch("ROLLBACK");
                        return Err(e.into());
                    }
                }
                TransactionEnd::Rollback => entry.conn.execute_batch("ROLLBACK")?,
            }
            Ok(0)
        });
        if self.sessions.contains(id) {
            self.close_session_cursors(id);
        }
        self.report(id, result)
    }

    fn execute_statement(&mut self, session: SessionHandle, sql: &str) -> i32 {
        let result = self.session(session.bits()).and_then(|entry| {
            let mut prepared = entry.conn.prepare(sql)?;
            if prepared.column_count() > 0 {
                return Err(Failure::new(RETURNS_RESULTS, "Statement returns a result set; open a cursor"));
            }
            Ok(clamp(prepared.execute([])?))
        });
        self.report(session.bits(), result)
    }

    fn get_error(&mut self, handle: RawHandle, code: &mut i32, buf: &mut [u8]) -> i32 {
        match self.errors.get(&handle.bits()) {
            Some(failure) => {
                *code = failure.code;
                write_text(buf, failure.message.as_bytes())
            }
            None => {
                *code = 0;
                write_text(buf, b"")
            }
        }
    }
}

impl StatementApi for SqliteEngine {
    fn begin_statement(
        &mut self,
        session: SessionHandle,
        sql: &str,
        mode: CursorMode,
        statement: &mut StatementHandle,
    ) -> i32 {
        let result = self.try_begin_statement(session.bits(), sql).map(|id| {
            debug!(statement = id, ?mode, "statement prepared");
            *statement = StatementHandle::from_bits(id);
            0
        });
        self.report(session.bits(), result)
    }

    fn end_statement(&mut self, statement: StatementHandle) -> i32 {
        let id = statement.bits();
        if !self.statements.contains(id) {
            return self.report(id, Err(Failure::invalid_handle("statement", id)));
        }
        self.drop_statement(id);
        0
    }

    fn open_cursor(&mut self, statement: StatementHandle) -> i32 {
        let result = self.try_open_cursor(statement);
        self.report(statement.bits(), result)
    }

    fn close_cursor(&mut self, statement: StatementHandle) -> i32 {
        self.drop_reads(statement.bits());
        let result = self.statement_mut(statement).and_then(|entry| match entry.cursor.take() {
            Some(_) => Ok(0),
            None => Err(Failure::new(CURSOR_STATE, "No open cursor")),
        });
        self.report(statement.bits(), result)
    }

    fn add_batch(&mut self, statement: StatementHandle) -> i32 {
        let result = self.statement_mut(statement).and_then(|entry| {
            if !entry.columns.is_empty() {
                return Err(Failure::new(RETURNS_RESULTS, "Cannot batch a query"));
            }
            let values = bound_values(&entry.params)?;
            entry.batch.push(values);
            entry.params.iter_mut().for_each(|p| *p = None);
            Ok(0)
        });
        self.report(statement.bits(), result)
    }

    fn execute(&mut self, statement: StatementHandle) -> i32 {
        let result = self.try_execute(statement);
        self.report(statement.bits(), result)
    }

    fn fetch(&mut self, statement: StatementHandle) -> i32 {
        self.drop_reads(statement.bits());
        let result = self.statement_mut(statement).and_then(|entry| {
            let cursor = entry
                .cursor
                .as_mut()
                .ok_or_else(|| Failure::new(CURSOR_STATE, "No open cursor"))?;
            let next = cursor.position.map_or(0, |p| p + 1).min(cursor.rows.len());
            cursor.position = Some(next);
            if next < cursor.rows.len() {
                Ok(0)
            } else {
                Ok(FETCH_NO_DATA)
            }
        });
        self.report(statement.bits(), result)
    }

    fn parameter_count(&mut self, statement: StatementHandle) -> i32 {
        let result = self.statement(statement).map(|entry| clamp(entry.params.len()));
        self.report(statement.bits(), result)
    }

    fn parameter_name(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        let result = self.statement(statement).and_then(|entry| {
            let slot = slot(index, entry.parameter_names.len())?;
            Ok(write_text(buf, entry.parameter_names[slot].as_bytes()))
        });
        self.report(statement.bits(), result)
    }

    fn parameter_type(&mut self, statement: StatementHandle, index: i16) -> i32 {
        let result = self.statement(statement).and_then(|entry| {
            let slot = slot(index, entry.params.len())?;
            Ok(types::code_for_parameter(entry.params[slot].as_ref()))
        });
        self.report(statement.bits(), result)
    }

    fn column_count(&mut self, statement: StatementHandle) -> i32 {
        let result = self.statement(statement).map(|entry| clamp(entry.columns.len()));
        self.report(statement.bits(), result)
    }

    fn column_name(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        let result = self.statement(statement).and_then(|entry| {
            let slot = slot(index, entry.columns.len())?;
            Ok(write_text(buf, entry.columns[slot].name.as_bytes()))
        });
        self.report(statement.bits(), result)
    }

    fn column_type(&mut self, statement: StatementHandle, index: i16) -> i32 {
        let result = self.statement(statement).and_then(|entry| {
            let slot = slot(index, entry.columns.len())?;
            Ok(entry.columns[slot].type_code)
        });
        self.report(statement.bits(), result)
    }
}

impl NullApi for SqliteEngine {
    fn is_null(&mut self, statement: StatementHandle, index: i16) -> i32 {
        self.drop_reads(statement.bits());
        let result = self
            .column_value(statement, index)
            .map(|value| matches!(value, SqlValue::Null) as i32);
        self.report(statement.bits(), result)
    }

    fn set_null(&mut self, statement: StatementHandle, index: i16) -> i32 {
        self.bind(statement, index, SqlValue::Null)
    }
}

impl ScalarApi for SqliteEngine {
    fn get_int32(&mut self, statement: StatementHandle, index: i16, value: &mut i32) -> i32 {
        let result = self.non_null(statement, index).and_then(types::to_i32).map(|v| {
            *value = v;
            0
        });
        self.report(statement.bits(), result)
    }

    fn get_int64(&mut self, statement: StatementHandle, index: i16, value: &mut i64) -> i32 {
        let result = self.non_null(statement, index).and_then(types::to_i64).map(|v| {
            *value = v;
            0
        });
        self.report(statement.bits(), result)
    }

    fn get_double(&mut self, statement: StatementHandle, index: i16, value: &mut f64) -> i32 {
        let result = self.non_null(statement, index).and_then(types::to_f64).map(|v| {
            *value = v;
            0
        });
        self.report(statement.bits(), result)
    }

    fn get_float(&mut self, statement: StatementHandle, index: i16, value: &mut f32) -> i32 {
        let result = self.non_null(statement, index).and_then(types::to_f64).map(|v| {
            *value = v as f32;
            0
        });
        self.report(statement.bits(), result)
    }

    fn get_boolean(&mut self, statement: StatementHandle, index: i16) -> i32 {
        let result = self
            .non_null(statement, index)
            .and_then(types::to_bool)
            .map(|v| v as i32);
        self.report(statement.bits(), result)
    }

    fn get_uuid(&mut self, statement: StatementHandle, index: i16, value: &mut [u8; 16]) -> i32 {
        let result = self.non_null(statement, index).and_then(types::to_uuid).map(|v| {
            *value = v;
            0
        });
        self.report(statement.bits(), result)
    }

    fn set_int32(&mut self, statement: StatementHandle, index: i16, value: i32) -> i32 {
        self.bind(statement, index, SqlValue::Integer(i64::from(value)))
    }

    fn set_int64(&mut self, statement: StatementHandle, index: i16, value: i64) -> i32 {
        self.bind(statement, index, SqlValue::Integer(value))
    }

    fn set_double(&mut self, statement: StatementHandle, index: i16, value: f64) -> i32 {
        self.bind(statement, index, SqlValue::Real(value))
    }

    fn set_float(&mut self, statement: StatementHandle, index: i16, value: f32) -> i32 {
        self.bind(statement, index, SqlValue::Real(f64::from(value)))
    }

    fn set_boolean(&mut self, statement: StatementHandle, index: i16, value: bool) -> i32 {
        self.bind(statement, index, SqlValue::Integer(i64::from(value)))
    }

    fn set_uuid(&mut self, statement: StatementHandle, index: i16, value: &[u8; 16]) -> i32 {
        self.bind(statement, index, SqlValue::Blob(value.to_vec()))
    }
}

impl VarlenApi for SqliteEngine {
    fn get_string(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        let result = self
            .non_null(statement, index)
            .and_then(types::to_text)
            .map(|text| write_text(buf, text.as_bytes()));
        self.report(statement.bits(), result)
    }

    fn get_binary(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        let result = self
            .non_null(statement, index)
            .and_then(types::to_bytes)
            .map(|bytes| write_bytes(buf, &bytes));
        self.report(statement.bits(), result)
    }

    fn set_string(&mut self, statement: StatementHandle, index: i16, value: &str) -> i32 {
        self.bind(statement, index, SqlValue::Text(value.to_string()))
    }

    fn set_binary(&mut self, statement: StatementHandle, index: i16, value: &[u8]) -> i32 {
        self.bind(statement, index, SqlValue::Blob(value.to_vec()))
    }
}

impl LobApi for SqliteEngine {
    fn set_lob(
        &mut self,
        statement: StatementHandle,
        index: i16,
        length: usize,
        kind: LobKind,
        lob: &mut LobHandle,
    ) -> i32 {
        let id = statement.bits();
        self.drop_reads(id);
        let result = self.statement_mut(statement).and_then(|entry| {
            let slot = slot(index, entry.params.len())?;
            // unset until the last chunk arrives
            entry.params[slot] = match (length, kind) {
                (0, LobKind::Blob) => Some(SqlValue::Blob(Vec::new())),
                (0, LobKind::Nclob) => Some(SqlValue::Text(String::new())),
                _ => None,
            };
            Ok(slot)
        });
        if let Ok(slot) = result {
            let superseded = self.lobs.ids_where(|lob| {
                matches!(lob, LobTransfer::Write { statement: owner, slot: s, .. } if *owner == id && *s == slot)
            });
            for lob in superseded {
                self.lobs.remove(lob);
            }
        }
        let result = result.map(|slot| {
            if length == 0 {
                *lob = LobHandle::default();
                return 0;
            }
            let transfer = LobTransfer::Write {
                statement: id,
                slot,
                expected: length,
                data: Vec::new(),
            };
            *lob = LobHandle::from_bits(self.lobs.insert(&mut self.ids, transfer));
            trace!(statement = id, length, lob = lob.bits(), "LOB write opened");
            0
        });
        self.report(id, result)
    }

    fn set_blob_data(&mut self, lob: &mut LobHandle, data: &[u8]) -> i32 {
        self.put_lob(lob, data, false)
    }

    fn set_nclob_data(&mut self, lob: &mut LobHandle, data: &[u8]) -> i32 {
        self.put_lob(lob, data, true)
    }

    fn get_lob(
        &mut self,
        statement: StatementHandle,
        index: i16,
        length: &mut usize,
        lob: &mut LobHandle,
    ) -> i32 {
        let id = statement.bits();
        self.drop_reads(id);
        let result = self.non_null(statement, index).and_then(|value| match value {
            SqlValue::Blob(bytes) => Ok((bytes.clone(), bytes.len())),
            SqlValue::Text(text) => Ok((text.as_bytes().to_vec(), text.chars().count())),
            _ => Err(Failure::conversion("LOB")),
        });
        let result = result.map(|(data, reported)| {
            *length = reported;
            if data.is_empty() {
                *lob = LobHandle::default();
                return 0;
            }
            let transfer = LobTransfer::Read {
                statement: id,
                data,
                position: 0,
            };
            *lob = LobHandle::from_bits(self.lobs.insert(&mut self.ids, transfer));
            trace!(statement = id, length = reported, lob = lob.bits(), "LOB read opened");
            0
        });
        self.report(id, result)
    }

    fn get_blob_data(&mut self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        self.take_lob(lob, buf)
    }

    fn get_nclob_data(&mut self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        self.take_lob(lob, buf)
    }
}

fn slot(index: i16, count: usize) -> Result<usize, Failure> {
    if index >= 1 && (index as usize) <= count {
        Ok(index as usize - 1)
    } else {
        Err(Failure::invalid_index(index, count))
    }
}

fn clamp(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn bound_values(params: &[Option<SqlValue>]) -> Result<Vec<SqlValue>, Failure> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.clone()
                .ok_or_else(|| Failure::new(PARAMETER_NOT_SET, format!("Parameter {} not set", i + 1)))
        })
        .collect()
}

fn query_rows(conn: &Connection, sql: &str, values: &[SqlValue]) -> rusqlite::Result<Vec<Vec<SqlValue>>> {
    let mut prepared = conn.prepare_cached(sql)?;
    for (i, value) in values.iter().enumerate() {
        prepared.raw_bind_parameter(i + 1, value)?;
    }
    let count = prepared.column_count();
    let mut rows = prepared.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            values.push(row.get::<_, SqlValue>(i)?);
        }
        out.push(values);
    }
    Ok(out)
}

fn execute_update(conn: &Connection, sql: &str, values: &[SqlValue]) -> rusqlite::Result<usize> {
    let mut prepared = conn.prepare_cached(sql)?;
    for (i, value) in values.iter().enumerate() {
        prepared.raw_bind_parameter(i + 1, value)?;
    }
    prepared.raw_execute()
}

/// Writes `value` NUL-terminated, truncating to fit. Returns the full length.
fn write_text(buf: &mut [u8], value: &[u8]) -> i32 {
    if let Some(room) = buf.len().checked_sub(1) {
        let n = value.len().min(room);
        buf[..n].copy_from_slice(&value[..n]);
        buf[n] = 0;
    }
    clamp(value.len())
}

/// Writes as much of `value` as fits. Returns the full length.
fn write_bytes(buf: &mut [u8], value: &[u8]) -> i32 {
    let n = value.len().min(buf.len());
    buf[..n].copy_from_slice(&value[..n]);
    clamp(value.len())
}
