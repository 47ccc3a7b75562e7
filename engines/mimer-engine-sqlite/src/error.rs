///
/// Engine-side failures and the status codes they map to.
///
/// Every failing call records a `Failure` against the handle it was made
/// on (retrievable through `get_error`) and returns the failure's code.
/// Codes are grouped so that the bridge's error classification puts each
/// in the expected class:
/// - 10xxx data, 11xxx/16xxx operational, 12xxx/14xxx/24xxx programming
/// - 18xxx database, 21xxx integrity
///

use thiserror::Error;

pub const CONVERSION_FAILURE: i32 = -10101;
pub const TRANSACTION_STATE: i32 = -11101;
pub const SQL_ERROR: i32 = -12101;
pub const PARAMETER_NOT_SET: i32 = -12102;
pub const CURSOR_STATE: i32 = -14101;
pub const NOT_A_QUERY: i32 = -14102;
pub const RETURNS_RESULTS: i32 = -14103;
pub const LOB_STATE: i32 = -16101;
pub const LOB_OVERFLOW: i32 = -16102;
pub const ENGINE_FAILURE: i32 = -18101;
pub const CONSTRAINT_VIOLATION: i32 = -21101;
pub const INVALID_HANDLE: i32 = -24101;
pub const INVALID_INDEX: i32 = -24102;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub code: i32,
    pub message: String,
}

impl Failure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Failure {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_handle(kind: &str, bits: u64) -> Self {
        Failure::new(INVALID_HANDLE, format!("Invalid {} handle {:#x}", kind, bits))
    }

    pub fn invalid_index(index: i16, count: usize) -> Self {
        Failure::new(
            INVALID_INDEX,
            format!("Index {} out of range 1..={}", index, count),
        )
    }

    pub fn conversion(what: &str) -> Self {
        Failure::new(CONVERSION_FAILURE, format!("Cannot convert value to {}", what))
    }
}

impl From<rusqlite::Error> for Failure {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let code = match (&e, e.sqlite_error_code()) {
            (_, Some(ErrorCode::ConstraintViolation)) => CONSTRAINT_VIOLATION,
            // SQLITE_ERROR: syntax errors, missing tables and columns
            (_, Some(ErrorCode::Unknown)) => SQL_ERROR,
            (_, Some(_)) => ENGINE_FAILURE,
            (rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::Utf8Error(_), None) => CONVERSION_FAILURE,
            (_, None) => ENGINE_FAILURE,
        };
        Failure::new(code, e.to_string())
    }
}
