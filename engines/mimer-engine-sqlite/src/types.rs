///
/// Type mapping between SQLite storage and Mimer type codes.
///
/// Column types come from the declared type of the column when SQLite
/// knows it, and from the storage class of the first non-null value
/// otherwise (expressions, aggregates). Conversions follow SQLite's loose
/// typing where the target is unambiguous and fail otherwise.
///

use mimer_bridge::value::codes;
use rusqlite::types::Value as SqlValue;

use crate::error::Failure;

/// Type code for a declared column type.
pub fn code_for_decltype(decltype: &str) -> i32 {
    let t = decltype.trim().to_ascii_uppercase();
    let base = t.split('(').next().unwrap_or("").trim();
    match base {
        "BIGINT" | "INT8" => codes::NATIVE_BIGINT,
        "SMALLINT" | "INT2" | "TINYINT" => codes::SMALLINT,
        "INT" | "INTEGER" | "INT4" | "MEDIUMINT" => codes::NATIVE_INTEGER,
        "BOOLEAN" | "BOOL" => codes::BOOLEAN,
        "UUID" | "BUILTIN.UUID" => codes::UUID,
        "BLOB" | "BINARY LARGE OBJECT" => codes::BLOB,
        "CLOB" => codes::CLOB,
        "NCLOB" | "NATIONAL CHARACTER LARGE OBJECT" => codes::NCLOB,
        "BINARY" => codes::BINARY,
        "VARBINARY" | "BINARY VARYING" => codes::BINARY_VARYING,
        "REAL" => codes::NATIVE_REAL,
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => codes::NATIVE_DOUBLE,
        "DECIMAL" => codes::DECIMAL,
        "NUMERIC" => codes::NUMERIC,
        "DATE" => codes::DATE,
        "TIME" => codes::TIME,
        "TIMESTAMP" | "DATETIME" => codes::TIMESTAMP,
        "CHAR" | "CHARACTER" => codes::CHARACTER,
        "NCHAR" | "NATIONAL CHARACTER" => codes::NATIONAL_CHARACTER,
        "NVARCHAR" | "NATIONAL CHARACTER VARYING" => codes::NATIONAL_CHARACTER_VARYING,
        _ => codes::CHARACTER_VARYING,
    }
}

/// Type code for a value whose column has no declared type.
pub fn code_for_value(value: &SqlValue) -> i32 {
    match value {
        SqlValue::Integer(_) => codes::NATIVE_BIGINT,
        SqlValue::Real(_) => codes::NATIVE_DOUBLE,
        SqlValue::Blob(_) => codes::BINARY_VARYING,
        SqlValue::Text(_) | SqlValue::Null => codes::CHARACTER_VARYING,
    }
}

/// Type code reported for a parameter. SQLite does not type parameters,
/// so this is the type of the bound value, or character varying when
/// nothing is bound yet.
pub fn code_for_parameter(bound: Option<&SqlValue>) -> i32 {
    match bound {
        Some(SqlValue::Null) | None => codes::CHARACTER_VARYING,
        Some(value) => code_for_value(value),
    }
}

pub fn to_i64(value: &SqlValue) -> Result<i64, Failure> {
    match value {
        SqlValue::Integer(i) => Ok(*i),
        SqlValue::Real(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
            Ok(*f as i64)
        }
        SqlValue::Text(s) => s.trim().parse().map_err(|_| Failure::conversion("integer")),
        _ => Err(Failure::conversion("integer")),
    }
}

pub fn to_i32(value: &SqlValue) -> Result<i32, Failure> {
    let wide = to_i64(value)?;
    i32::try_from(wide).map_err(|_| Failure::conversion("32-bit integer"))
}

pub fn to_f64(value: &SqlValue) -> Result<f64, Failure> {
    match value {
        SqlValue::Real(f) => Ok(*f),
        SqlValue::Integer(i) => Ok(*i as f64),
        SqlValue::Text(s) => s.trim().parse().map_err(|_| Failure::conversion("double")),
        _ => Err(Failure::conversion("double")),
    }
}

pub fn to_bool(value: &SqlValue) -> Result<bool, Failure> {
    match value {
        SqlValue::Integer(i) => Ok(*i != 0),
        SqlValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(Failure::conversion("boolean")),
        },
        _ => Err(Failure::conversion("boolean")),
    }
}

pub fn to_uuid(value: &SqlValue) -> Result<[u8; 16], Failure> {
    match value {
        SqlValue::Blob(b) => <[u8; 16]>::try_from(b.as_slice()).map_err(|_| Failure::conversion("UUID")),
        SqlValue::Text(s) => uuid::Uuid::parse_str(s.trim())
            .map(|u| *u.as_bytes())
            .map_err(|_| Failure::conversion("UUID")),
        _ => Err(Failure::conversion("UUID")),
    }
}

/// Character representation of a value.
pub fn to_text(value: &SqlValue) -> Result<String, Failure> {
    match value {
        SqlValue::Text(s) => Ok(s.clone()),
        SqlValue::Integer(i) => Ok(i.to_string()),
        SqlValue::Real(f) => Ok(f.to_string()),
        SqlValue::Blob(b) => String::from_utf8(b.clone()).map_err(|_| Failure::conversion("character")),
        SqlValue::Null => Err(Failure::conversion("character")),
    }
}

pub fn to_bytes(value: &SqlValue) -> Result<Vec<u8>, Failure> {
    match value {
        SqlValue::Blob(b) => Ok(b.clone()),
        SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
        _ => Err(Failure::conversion("binary")),
    }
}
