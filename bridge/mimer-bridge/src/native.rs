//!
//! Engine over the Mimer SQL C library (`libmimerapi`).
//!
//! Handles are the library's opaque pointers carried as bits. Strings
//! going in are NUL-terminated copies; a string containing an interior NUL
//! cannot be passed and is rejected with `DATA_CONVERSION` before the call.
//!

use std::ffi::{CStr, CString};

use libc::{c_char, c_void, size_t};

use crate::engine::{
    CursorMode, LobApi, LobKind, NullApi, ScalarApi, SessionApi, StatementApi, TransactionEnd, VarlenApi,
};
use crate::handle::{LobHandle, RawHandle, SessionHandle, StatementHandle};
use crate::status::Status;

type Handle = *mut c_void;

#[link(name = "mimerapi")]
unsafe extern "C" {
    fn MimerAPIVersion() -> *const c_char;

    fn MimerBeginSession8(
        database: *const c_char,
        user: *const c_char,
        password: *const c_char,
        session: *mut Handle,
    ) -> i32;
    fn MimerEndSession(session: *mut Handle) -> i32;
    fn MimerBeginTransaction(session: Handle) -> i32;
    fn MimerEndTransaction(session: Handle, commit_rollback: i32) -> i32;
    fn MimerExecuteStatement8(session: Handle, sql: *const c_char) -> i32;
    fn MimerGetError8(handle: Handle, code: *mut i32, buf: *mut c_char, len: size_t) -> i32;

    fn MimerBeginStatement8(
        session: Handle,
        sql: *const c_char,
        options: i32,
        statement: *mut Handle,
    ) -> i32;
    fn MimerEndStatement(statement: *mut Handle) -> i32;
    fn MimerOpenCursor(statement: Handle) -> i32;
    fn MimerCloseCursor(statement: Handle) -> i32;
    fn MimerAddBatch(statement: Handle) -> i32;
    fn MimerExecute(statement: Handle) -> i32;
    fn MimerFetch(statement: Handle) -> i32;
    fn MimerParameterCount(statement: Handle) -> i32;
    fn MimerParameterName8(statement: Handle, index: i16, buf: *mut c_char, len: size_t) -> i32;
    fn MimerParameterType(statement: Handle, index: i16) -> i32;
    fn MimerColumnCount(statement: Handle) -> i32;
    fn MimerColumnName8(statement: Handle, index: i16, buf: *mut c_char, len: size_t) -> i32;
    fn MimerColumnType(statement: Handle, index: i16) -> i32;

    fn MimerIsNull(statement: Handle, index: i16) -> i32;
    fn MimerSetNull(statement: Handle, index: i16) -> i32;

    fn MimerGetInt32(statement: Handle, index: i16, value: *mut i32) -> i32;
    fn MimerGetInt64(statement: Handle, index: i16, value: *mut i64) -> i32;
    fn MimerGetDouble(statement: Handle, index: i16, value: *mut f64) -> i32;
    fn MimerGetFloat(statement: Handle, index: i16, value: *mut f32) -> i32;
    fn MimerGetBoolean(statement: Handle, index: i16) -> i32;
    fn MimerGetUUID(statement: Handle, index: i16, value: *mut u8) -> i32;
    fn MimerSetInt32(statement: Handle, index: i16, value: i32) -> i32;
    fn MimerSetInt64(statement: Handle, index: i16, value: i64) -> i32;
    fn MimerSetDouble(statement: Handle, index: i16, value: f64) -> i32;
    fn MimerSetFloat(statement: Handle, index: i16, value: f32) -> i32;
    fn MimerSetBoolean(statement: Handle, index: i16, value: i32) -> i32;
    fn MimerSetUUID(statement: Handle, index: i16, value: *const u8) -> i32;

    fn MimerGetString8(statement: Handle, index: i16, buf: *mut c_char, len: size_t) -> i32;
    fn MimerGetBinary(statement: Handle, index: i16, buf: *mut c_void, len: size_t) -> i32;
    fn MimerSetString8(statement: Handle, index: i16, value: *const c_char) -> i32;
    fn MimerSetBinary(statement: Handle, index: i16, value: *const c_void, len: size_t) -> i32;

    fn MimerSetLob(statement: Handle, index: i16, length: size_t, lob: *mut Handle) -> i32;
    fn MimerSetBlobData(lob: *mut Handle, data: *const c_void, len: size_t) -> i32;
    fn MimerSetNclobData8(lob: *mut Handle, data: *const c_char, len: size_t) -> i32;
    fn MimerGetLob(statement: Handle, index: i16, length: *mut size_t, lob: *mut Handle) -> i32;
    fn MimerGetBlobData(lob: *mut Handle, buf: *mut c_void, len: size_t) -> i32;
    fn MimerGetNclobData8(lob: *mut Handle, buf: *mut c_char, len: size_t) -> i32;
}

fn ptr(bits: u64) -> Handle {
    bits as usize as Handle
}

fn bits(handle: Handle) -> u64 {
    handle as usize as u64
}

fn stmt(statement: StatementHandle) -> Handle {
    ptr(statement.bits())
}

/// Runs `call` with a NUL-terminated copy of `text`.
fn with_cstr(text: &str, call: impl FnOnce(*const c_char) -> i32) -> i32 {
    match CString::new(text) {
        Ok(c) => call(c.as_ptr()),
        Err(_) => Status::DATA_CONVERSION.code(),
    }
}

/// Runs `call` against the LOB pointer and writes the updated pointer back.
fn with_lob(lob: &mut LobHandle, call: impl FnOnce(*mut Handle) -> i32) -> i32 {
    let mut raw = ptr(lob.bits());
    let rc = call(&mut raw);
    *lob = LobHandle::from_bits(bits(raw));
    rc
}

/// Engine backed by the linked Mimer SQL client library.
#[derive(Debug, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        NativeEngine
    }
}

impl SessionApi for NativeEngine {
    fn api_version(&self) -> String {
        // SAFETY: the library returns a pointer to a static NUL-terminated string.
        unsafe {
            let version = MimerAPIVersion();
            if version.is_null() {
                return String::new();
            }
            CStr::from_ptr(version).to_string_lossy().into_owned()
        }
    }

    fn begin_session(
        &mut self,
        database: &str,
        user: &str,
        password: &str,
        session: &mut SessionHandle,
    ) -> i32 {
        let (Ok(database), Ok(user), Ok(password)) =
            (CString::new(database), CString::new(user), CString::new(password))
        else {
            return Status::DATA_CONVERSION.code();
        };
        let mut raw: Handle = std::ptr::null_mut();
        // SAFETY: all strings outlive the call and `raw` is a valid out-pointer.
        let rc = unsafe {
            MimerBeginSession8(database.as_ptr(), user.as_ptr(), password.as_ptr(), &mut raw)
        };
        *session = SessionHandle::from_bits(bits(raw));
        rc
    }

    fn end_session(&mut self, session: SessionHandle) -> i32 {
        let mut raw = ptr(session.bits());
        // SAFETY: the handle bits came from `begin_session`.
        unsafe { MimerEndSession(&mut raw) }
    }

    fn begin_transaction(&mut self, session: SessionHandle) -> i32 {
        unsafe { MimerBeginTransaction(ptr(session.bits())) }
    }

    fn end_transaction(&mut self, session: SessionHandle, end: TransactionEnd) -> i32 {
        unsafe { MimerEndTransaction(ptr(session.bits()), end as i32) }
    }

    fn execute_statement(&mut self, session: SessionHandle, sql: &str) -> i32 {
        with_cstr(sql, |sql| unsafe { MimerExecuteStatement8(ptr(session.bits()), sql) })
    }

    fn get_error(&mut self, handle: RawHandle, code: &mut i32, buf: &mut [u8]) -> i32 {
        unsafe { MimerGetError8(ptr(handle.bits()), code, buf.as_mut_ptr().cast(), buf.len()) }
    }
}

impl StatementApi for NativeEngine {
    fn begin_statement(
        &mut self,
        session: SessionHandle,
        sql: &str,
        mode: CursorMode,
        statement: &mut StatementHandle,
    ) -> i32 {
        let mut raw: Handle = std::ptr::null_mut();
        let rc = with_cstr(sql, |sql| unsafe {
            MimerBeginStatement8(ptr(session.bits()), sql, mode as i32, &mut raw)
        });
        *statement = StatementHandle::from_bits(bits(raw));
        rc
    }

    fn end_statement(&mut self, statement: StatementHandle) -> i32 {
        let mut raw = stmt(statement);
        unsafe { MimerEndStatement(&mut raw) }
    }

    fn open_cursor(&mut self, statement: StatementHandle) -> i32 {
        unsafe { MimerOpenCursor(stmt(statement)) }
    }

    fn close_cursor(&mut self, statement: StatementHandle) -> i32 {
        unsafe { MimerCloseCursor(stmt(statement)) }
    }

    fn add_batch(&mut self, statement: StatementHandle) -> i32 {
        unsafe { MimerAddBatch(stmt(statement)) }
    }

    fn execute(&mut self, statement: StatementHandle) -> i32 {
        unsafe { MimerExecute(stmt(statement)) }
    }

    fn fetch(&mut self, statement: StatementHandle) -> i32 {
        unsafe { MimerFetch(stmt(statement)) }
    }

    fn parameter_count(&mut self, statement: StatementHandle) -> i32 {
        unsafe { MimerParameterCount(stmt(statement)) }
    }

    fn parameter_name(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        unsafe { MimerParameterName8(stmt(statement), index, buf.as_mut_ptr().cast(), buf.len()) }
    }

    fn parameter_type(&mut self, statement: StatementHandle, index: i16) -> i32 {
        unsafe { MimerParameterType(stmt(statement), index) }
    }

    fn column_count(&mut self, statement: StatementHandle) -> i32 {
        unsafe { MimerColumnCount(stmt(statement)) }
    }

    fn column_name(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        unsafe { MimerColumnName8(stmt(statement), index, buf.as_mut_ptr().cast(), buf.len()) }
    }

    fn column_type(&mut self, statement: StatementHandle, index: i16) -> i32 {
        unsafe { MimerColumnType(stmt(statement), index) }
    }
}

impl NullApi for NativeEngine {
    fn is_null(&mut self, statement: StatementHandle, index: i16) -> i32 {
        unsafe { MimerIsNull(stmt(statement), index) }
    }

    fn set_null(&mut self, statement: StatementHandle, index: i16) -> i32 {
        unsafe { MimerSetNull(stmt(statement), index) }
    }
}

impl ScalarApi for NativeEngine {
    fn get_int32(&mut self, statement: StatementHandle, index: i16, value: &mut i32) -> i32 {
        unsafe { MimerGetInt32(stmt(statement), index, value) }
    }

    fn get_int64(&mut self, statement: StatementHandle, index: i16, value: &mut i64) -> i32 {
        unsafe { MimerGetInt64(stmt(statement), index, value) }
    }

    fn get_double(&mut self, statement: StatementHandle, index: i16, value: &mut f64) -> i32 {
        unsafe { MimerGetDouble(stmt(statement), index, value) }
    }

    fn get_float(&mut self, statement: StatementHandle, index: i16, value: &mut f32) -> i32 {
        unsafe { MimerGetFloat(stmt(statement), index, value) }
    }

    fn get_boolean(&mut self, statement: StatementHandle, index: i16) -> i32 {
        unsafe { MimerGetBoolean(stmt(statement), index) }
    }

    fn get_uuid(&mut self, statement: StatementHandle, index: i16, value: &mut [u8; 16]) -> i32 {
        unsafe { MimerGetUUID(stmt(statement), index, value.as_mut_ptr()) }
    }

    fn set_int32(&mut self, statement: StatementHandle, index: i16, value: i32) -> i32 {
        unsafe { MimerSetInt32(stmt(statement), index, value) }
    }

    fn set_int64(&mut self, statement: StatementHandle, index: i16, value: i64) -> i32 {
        unsafe { MimerSetInt64(stmt(statement), index, value) }
    }

    fn set_double(&mut self, statement: StatementHandle, index: i16, value: f64) -> i32 {
        unsafe { MimerSetDouble(stmt(statement), index, value) }
    }

    fn set_float(&mut self, statement: StatementHandle, index: i16, value: f32) -> i32 {
        unsafe { MimerSetFloat(stmt(statement), index, value) }
    }

    fn set_boolean(&mut self, statement: StatementHandle, index: i16, value: bool) -> i32 {
        unsafe { MimerSetBoolean(stmt(statement), index, value as i32) }
    }

    fn set_uuid(&mut self, statement: StatementHandle, index: i16, value: &[u8; 16]) -> i32 {
        unsafe { MimerSetUUID(stmt(statement), index, value.as_ptr()) }
    }
}

impl VarlenApi for NativeEngine {
    fn get_string(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        unsafe { MimerGetString8(stmt(statement), index, buf.as_mut_ptr().cast(), buf.len()) }
    }

    fn get_binary(&mut self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        unsafe { MimerGetBinary(stmt(statement), index, buf.as_mut_ptr().cast(), buf.len()) }
    }

    fn set_string(&mut self, statement: StatementHandle, index: i16, value: &str) -> i32 {
        with_cstr(value, |value| unsafe { MimerSetString8(stmt(statement), index, value) })
    }

    fn set_binary(&mut self, statement: StatementHandle, index: i16, value: &[u8]) -> i32 {
        unsafe { MimerSetBinary(stmt(statement), index, value.as_ptr().cast(), value.len()) }
    }
}

impl LobApi for NativeEngine {
    fn set_lob(
        &mut self,
        statement: StatementHandle,
        index: i16,
        length: usize,
        _kind: LobKind,
        lob: &mut LobHandle,
    ) -> i32 {
        with_lob(lob, |raw| unsafe { MimerSetLob(stmt(statement), index, length, raw) })
    }

    fn set_blob_data(&mut self, lob: &mut LobHandle, data: &[u8]) -> i32 {
        with_lob(lob, |raw| unsafe { MimerSetBlobData(raw, data.as_ptr().cast(), data.len()) })
    }

    fn set_nclob_data(&mut self, lob: &mut LobHandle, data: &[u8]) -> i32 {
        with_lob(lob, |raw| unsafe { MimerSetNclobData8(raw, data.as_ptr().cast(), data.len()) })
    }

    fn get_lob(
        &mut self,
        statement: StatementHandle,
        index: i16,
        length: &mut usize,
        lob: &mut LobHandle,
    ) -> i32 {
        with_lob(lob, |raw| unsafe { MimerGetLob(stmt(statement), index, length, raw) })
    }

    fn get_blob_data(&mut self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        with_lob(lob, |raw| unsafe { MimerGetBlobData(raw, buf.as_mut_ptr().cast(), buf.len()) })
    }

    fn get_nclob_data(&mut self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        with_lob(lob, |raw| unsafe { MimerGetNclobData8(raw, buf.as_mut_ptr().cast(), buf.len()) })
    }
}
