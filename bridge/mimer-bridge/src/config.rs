//!
//! # Bridge Configuration
//!
//! Transfer limits are engine-version specific, so they are configuration
//! rather than literals. A config file is TOML:
//!
//! ```toml
//! [transfer]
//! max_write_chunk = 9900000   # bytes per LOB write call
//! max_read_chunk = 100000     # bytes per LOB read call
//! nclob_expansion = 4         # buffer bytes per reported NCLOB character
//!
//! [session]
//! database = "bankdb"
//! user = "SYSADM"
//! password = "secret"
//! ```
//!
//! Every field is optional; missing fields take the defaults above (the
//! session section defaults to empty).
//!

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BridgeError;

pub const DEFAULT_MAX_WRITE_CHUNK: usize = 9_900_000;
pub const DEFAULT_MAX_READ_CHUNK: usize = 100_000;
pub const DEFAULT_NCLOB_EXPANSION: usize = 4;

/// Limits applied by the LOB transfer loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferPolicy {
    pub max_write_chunk: usize,
    pub max_read_chunk: usize,
    /// Buffer bytes reserved per character reported for a character LOB.
    /// Whether 4 covers every encoding the engine may use is unverified.
    pub nclob_expansion: usize,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_write_chunk: DEFAULT_MAX_WRITE_CHUNK,
            max_read_chunk: DEFAULT_MAX_READ_CHUNK,
            nclob_expansion: DEFAULT_NCLOB_EXPANSION,
        }
    }
}

impl TransferPolicy {
    pub fn validate(&self) -> Result<(), BridgeError> {
        check_chunk("max_write_chunk", self.max_write_chunk)?;
        check_chunk("max_read_chunk", self.max_read_chunk)?;
        if self.nclob_expansion == 0 {
            return Err(BridgeError::InvalidConfig(
                "nclob_expansion must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_chunk(name: &str, value: usize) -> Result<(), BridgeError> {
    if value == 0 {
        return Err(BridgeError::InvalidConfig(format!("{} must be positive", name)));
    }
    if value > i32::MAX as usize {
        return Err(BridgeError::InvalidConfig(format!(
            "{} must not exceed {}",
            name,
            i32::MAX
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub transfer: TransferPolicy,
    #[serde(default)]
    pub session: SessionConfig,
}

pub fn parse_config(path: &Path) -> Result<BridgeConfig, BridgeError> {
    if !path.exists() {
        return Err(BridgeError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<BridgeConfig, BridgeError> {
    let config: BridgeConfig = toml::from_str(content)?;
    config.transfer.validate()?;
    Ok(config)
}
