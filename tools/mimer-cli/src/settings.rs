///
/// Connection settings.
///
/// Command-line options win over the config file, and the config file wins
/// over the `MIMER_DATABASE` environment variable. User and password have
/// no environment fallback.
///

use std::path::Path;

use mimer_bridge::{parse_config, BridgeConfig, BridgeError, TransferPolicy};

pub const DATABASE_ENV: &str = "MIMER_DATABASE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: String,
    pub user: String,
    pub password: String,
    pub policy: TransferPolicy,
}

/// Options given on the command line.
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub database: Option<&'a str>,
    pub user: Option<&'a str>,
    pub password: Option<&'a str>,
}

pub fn load(config: Option<&Path>, overrides: Overrides<'_>) -> Result<Settings, BridgeError> {
    let config = match config {
        Some(path) => parse_config(path)?,
        None => BridgeConfig::default(),
    };
    Ok(resolve(config, overrides, std::env::var(DATABASE_ENV).ok()))
}

fn resolve(config: BridgeConfig, overrides: Overrides<'_>, env_database: Option<String>) -> Settings {
    let session = config.session;
    let database = overrides
        .database
        .map(str::to_string)
        .or(session.database)
        .or(env_database)
        .unwrap_or_default();
    Settings {
        database,
        user: overrides.user.map(str::to_string).or(session.user).unwrap_or_default(),
        password: overrides
            .password
            .map(str::to_string)
            .or(session.password)
            .unwrap_or_default(),
        policy: config.transfer,
    }
}
