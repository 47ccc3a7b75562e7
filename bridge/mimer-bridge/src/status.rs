//!
//! Status Codes and Fetch Results
//!
//! Every engine call returns a signed status:
//! - `0` on success
//! - negative on error (engine error or a reserved local code)
//! - positive from execute only, carrying the affected-row count
//!
//! Local codes live in the reserved `-25000..=-25999` range so they never
//! collide with the engine's own error space.
//!
//! Fetch operations return `Fetched<T>`: a status paired with a best-effort
//! payload. The payload is absent when the status is an error and when the
//! fetched value is SQL null (the sentinel response: status 0, no payload).
//!

use std::fmt;

use crate::error::BridgeError;

/// Fetch status reporting that the cursor moved past the last row.
pub const FETCH_NO_DATA: i32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Status(i32);

impl Status {
    pub const OK: Status = Status(0);
    /// Malformed input rejected before reaching the engine.
    pub const DATA_CONVERSION: Status = Status(-25020);
    /// A buffer allocation in this layer failed.
    pub const OUT_OF_MEMORY: Status = Status(-25030);
    /// The engine library is older than the minimum supported API version.
    pub const UNSUPPORTED_VERSION: Status = Status(-25101);

    pub const fn from_code(code: i32) -> Self {
        Status(code)
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_error(self) -> bool {
        self.0 < 0
    }

    /// True for codes raised by this layer rather than the engine.
    pub const fn is_local(self) -> bool {
        self.0 >= -25999 && self.0 <= -25000
    }

    /// Affected-row count reported by execute.
    pub fn row_count(self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }

    /// Fixed message for reserved local codes.
    pub fn local_message(self) -> Option<&'static str> {
        match self {
            Status::DATA_CONVERSION => Some("Data conversion error"),
            Status::OUT_OF_MEMORY => Some("Out of memory"),
            Status::UNSUPPORTED_VERSION => {
                Some("The operation requires Mimer API version 11.0.5A or newer")
            }
            _ => None,
        }
    }

    pub fn class(self) -> ErrorClass {
        ErrorClass::of(self.0)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_message() {
            Some(message) => write!(f, "{} ({})", message, self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

/// DB-API style classification of an error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    TransactionAbort,
    Data,
    Integrity,
    Internal,
    Interface,
    NotSupported,
    Operational,
    Programming,
    Database,
}

impl ErrorClass {
    /// Classify by the decimal digits of the negated code, most specific
    /// match first: the full five digits, then the leading four, then the
    /// leading two. Anything unmatched is internal.
    pub fn of(code: i32) -> ErrorClass {
        let n = code.unsigned_abs();
        match n {
            10001 | 10003 => return ErrorClass::TransactionAbort,
            24010 | 24011 => return ErrorClass::Data,
            _ => {}
        }
        match n / 10 {
            2500 | 2510 => return ErrorClass::NotSupported,
            2501 => return ErrorClass::Programming,
            2502 => return ErrorClass::Data,
            2503 => return ErrorClass::Operational,
            _ => {}
        }
        match n / 1000 {
            10 | 27 => ErrorClass::Data,
            11 | 16 => ErrorClass::Operational,
            12 | 14 | 24 | 25 => ErrorClass::Programming,
            18 => ErrorClass::Database,
            19 | 23 => ErrorClass::Internal,
            21 => ErrorClass::Integrity,
            26 => ErrorClass::Interface,
            28 => ErrorClass::NotSupported,
            _ => ErrorClass::Internal,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorClass::TransactionAbort => "TransactionAbortError",
            ErrorClass::Data => "DataError",
            ErrorClass::Integrity => "IntegrityError",
            ErrorClass::Internal => "InternalError",
            ErrorClass::Interface => "InterfaceError",
            ErrorClass::NotSupported => "NotSupportedError",
            ErrorClass::Operational => "OperationalError",
            ErrorClass::Programming => "ProgrammingError",
            ErrorClass::Database => "DatabaseError",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status plus best-effort payload returned by every fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct Fetched<T> {
    pub status: Status,
    pub value: Option<T>,
}

impl<T> Fetched<T> {
    pub fn ok(value: T) -> Self {
        Fetched {
            status: Status::OK,
            value: Some(value),
        }
    }

    /// The sentinel response for a SQL null.
    pub fn null() -> Self {
        Fetched {
            status: Status::OK,
            value: None,
        }
    }

    pub fn failed(status: impl Into<Status>) -> Self {
        Fetched {
            status: status.into(),
            value: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.status.is_ok() && self.value.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            status: self.status,
            value: self.value.map(f),
        }
    }

    /// Error statuses become `BridgeError`; success yields the optional payload.
    pub fn into_result(self) -> Result<Option<T>, BridgeError> {
        if self.status.is_error() {
            return Err(BridgeError::from(self.status));
        }
        Ok(self.value)
    }
}
