//! Process configuration
//!
//! Resolved once at startup from the environment, an optional `.env` file is loaded first by the
//! binaries. Empty variables count as unset.

use std::net::AddrParseError;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use crate::database::DatabaseConfig;
use crate::utils::env_var;
use crate::utils::non_empty;

/// Name of the database file in the home directory
const DEFAULT_DB_FILE_NAME: &str = ".hej.sqlite";

/// Directory with the frontend build
const DEFAULT_STATIC_DIR: &str = "www";

const DEFAULT_ADDRESS: &str = "0.0.0.0:8000";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `HEJ_DB_PATH` is not set and there is no home directory to fall back to
    #[error("`HEJ_DB_PATH` is not set and the home directory could not be determined")]
    NoHomeDirectory,

    /// `ADDRESS` is not a socket address
    #[error("Invalid `ADDRESS`: {0}")]
    InvalidAddress(#[from] AddrParseError),

    /// `PORT` is not a port number
    #[error("Invalid `PORT`: {0}")]
    InvalidPort(#[from] ParseIntError),

    /// `HEJ_SESSION_KEY` is required but not set
    #[error("Environment variable `HEJ_SESSION_KEY` is not set")]
    MissingSessionKey,
}

/// Everything Hej needs to know about its surroundings
#[derive(Clone, Debug)]
pub struct Config {
    /// Database to use
    pub database: DatabaseConfig,

    /// Key to log in with, required by the server only
    pub session_key: Option<String>,

    /// Directory with the frontend build
    pub static_dir: PathBuf,

    /// Address to listen on
    pub address: SocketAddr,
}

impl Config {
    /// Read the configuration from the process environment
    ///
    /// # Errors
    ///
    /// Will return `Err` when a variable has an invalid value or when no database location can
    /// be determined
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env_var)
    }

    /// Read the configuration through a lookup function, used with [`env_var`] normally
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`]
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = database_from_vars(&lookup, None)?;

        let lookup = |name: &str| non_empty(lookup(name));

        let static_dir = lookup("HEJ_STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.into());

        let mut address = lookup("ADDRESS")
            .unwrap_or_else(|| DEFAULT_ADDRESS.into())
            .parse::<SocketAddr>()?;

        // optional override of just the port
        if let Some(port) = lookup("PORT") {
            address.set_port(port.parse::<u16>()?);
        }

        Ok(Self {
            database,
            session_key: lookup("HEJ_SESSION_KEY"),
            static_dir: PathBuf::from(static_dir),
            address,
        })
    }

    /// The session key, for when it is required
    ///
    /// # Errors
    ///
    /// Will return `Err` when `HEJ_SESSION_KEY` is not set
    pub fn require_session_key(&self) -> Result<&str, ConfigError> {
        self.session_key
            .as_deref()
            .ok_or(ConfigError::MissingSessionKey)
    }
}

/// Only the database part of the configuration, for the command line client
///
/// An explicit `database_path` wins over `HEJ_DB_PATH`, the server settings are not looked at.
///
/// # Errors
///
/// Will return `Err` when no database location can be determined
pub fn database_from_env(database_path: Option<PathBuf>) -> Result<DatabaseConfig, ConfigError> {
    database_from_vars(env_var, database_path)
}

/// See [`database_from_env`]
///
/// # Errors
///
/// Will return `Err` when no database location can be determined
pub fn database_from_vars<F>(
    lookup: F,
    database_path: Option<PathBuf>,
) -> Result<DatabaseConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| non_empty(lookup(name));

    let database_path = match database_path.or_else(|| lookup("HEJ_DB_PATH").map(PathBuf::from)) {
        Some(path) => path,
        None => dirs::home_dir()
            .ok_or(ConfigError::NoHomeDirectory)?
            .join(DEFAULT_DB_FILE_NAME),
    };

    Ok(DatabaseConfig::file(database_path)
        .with_migrations_path(lookup("HEJ_MIGRATIONS_PATH").map(PathBuf::from)))
}
