//!
//! Bridge error types.
//!
//! The procedure interface itself reports failures as `Status` values next
//! to a best-effort payload. `BridgeError` is what callers get when they
//! opt into `Result` via `Fetched::into_result`, and what configuration
//! loading and version negotiation return.
//!

use std::path::PathBuf;
use thiserror::Error;

use crate::status::{ErrorClass, Status};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Engine error {code} ({})", class_of(.code))]
    Engine { code: i32 },

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Data conversion error")]
    DataConversion,

    #[error("Mimer API version {found} is older than the required {required}")]
    UnsupportedVersion { found: String, required: String },

    #[error("Malformed Mimer API version string '{0}'")]
    MalformedVersion(String),

    #[error("Config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn class_of(code: &i32) -> ErrorClass {
    ErrorClass::of(*code)
}

impl BridgeError {
    /// The status code a host would see for this error, when there is one.
    pub fn status(&self) -> Option<Status> {
        match self {
            BridgeError::Engine { code } => Some(Status::from_code(*code)),
            BridgeError::OutOfMemory => Some(Status::OUT_OF_MEMORY),
            BridgeError::DataConversion => Some(Status::DATA_CONVERSION),
            BridgeError::UnsupportedVersion { .. } => Some(Status::UNSUPPORTED_VERSION),
            _ => None,
        }
    }
}

impl From<Status> for BridgeError {
    fn from(status: Status) -> Self {
        match status {
            Status::OUT_OF_MEMORY => BridgeError::OutOfMemory,
            Status::DATA_CONVERSION => BridgeError::DataConversion,
            other => BridgeError::Engine { code: other.code() },
        }
    }
}
