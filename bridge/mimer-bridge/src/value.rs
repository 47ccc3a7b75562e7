//!
//! Engine type codes and dynamically typed column values.
//!

use std::fmt;

/// Engine type codes reported by `column_type` and `parameter_type`.
pub mod codes {
    pub const CHARACTER: i32 = 1;
    pub const DECIMAL: i32 = 2;
    pub const NUMERIC: i32 = 3;
    pub const INTEGER: i32 = 6;
    pub const FLOAT: i32 = 10;
    pub const DATE: i32 = 11;
    pub const TIME: i32 = 12;
    pub const TIMESTAMP: i32 = 13;
    pub const INTERVAL: i32 = 14;
    pub const BINARY: i32 = 34;
    pub const BINARY_VARYING: i32 = 35;
    pub const NATIONAL_CHARACTER: i32 = 39;
    pub const NATIONAL_CHARACTER_VARYING: i32 = 40;
    pub const BOOLEAN: i32 = 42;
    pub const SMALLINT: i32 = 48;
    pub const NATIVE_INTEGER: i32 = 50;
    pub const NATIVE_BIGINT: i32 = 52;
    pub const NATIVE_REAL: i32 = 54;
    pub const NATIVE_DOUBLE: i32 = 56;
    pub const BLOB: i32 = 57;
    pub const CLOB: i32 = 58;
    pub const NCLOB: i32 = 59;
    pub const CHARACTER_VARYING: i32 = 63;
    pub const UUID: i32 = 1111;
}

/// Which typed accessor reads a column of a given engine type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeFamily {
    Text,
    Int32,
    Int64,
    Double,
    Binary,
    Boolean,
    Blob,
    Nclob,
    Uuid,
}

impl TypeFamily {
    pub fn from_code(code: i32) -> Option<TypeFamily> {
        use codes::*;
        match code {
            CHARACTER | DECIMAL | NUMERIC | DATE | TIME | TIMESTAMP | INTERVAL
            | NATIONAL_CHARACTER | NATIONAL_CHARACTER_VARYING | CHARACTER_VARYING => {
                Some(TypeFamily::Text)
            }
            INTEGER | SMALLINT | NATIVE_INTEGER => Some(TypeFamily::Int32),
            NATIVE_BIGINT => Some(TypeFamily::Int64),
            FLOAT | NATIVE_REAL | NATIVE_DOUBLE => Some(TypeFamily::Double),
            BINARY | BINARY_VARYING => Some(TypeFamily::Binary),
            BOOLEAN => Some(TypeFamily::Boolean),
            BLOB => Some(TypeFamily::Blob),
            CLOB | NCLOB => Some(TypeFamily::Nclob),
            UUID => Some(TypeFamily::Uuid),
            _ => None,
        }
    }
}

/// A single column value read through the matching typed accessor.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    Text(String),
    Binary(Vec<u8>),
    Uuid(uuid::Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Binary(bytes) => {
                f.write_str("x'")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                f.write_str("'")
            }
            Value::Uuid(v) => write!(f, "{}", v.hyphenated()),
        }
    }
}
