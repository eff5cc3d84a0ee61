//! All things related to the storage of notes
//!
//! Every unit of work opens its own connection and its own transaction, see
//! [`open_transaction`]. There is no pool.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use sqlx::ConnectOptions;
use sqlx::SqliteConnection;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::SqliteConnectOptions;
use thiserror::Error;
use uuid::Uuid;

pub use Config as DatabaseConfig;
pub use bootstrap::migrate;
pub use connection::Connection;
pub use connection::Database;
pub use connection::RowStream;
pub use connection::ScopeFuture;
pub use connection::SqlQuery;
pub use connection::Transaction;
pub use form_types::*;
pub use types::format_timestamp;
pub use types::parse_timestamp;

pub mod notes;

mod bootstrap;
mod connection;
mod form_types;
mod types;

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A query or connection failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The addressed row does not exist
    #[error("unknown item '{id}' in table '{table}'")]
    UnknownItem {
        /// Table that was searched
        table: &'static str,

        /// ID that was not found
        id: Uuid,
    },

    /// A handle was used outside of its valid scope, this is a bug
    #[error("Usage error: {0}")]
    Usage(&'static str),

    /// Migration scripts could not be loaded or applied
    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    /// The database has been migrated by a newer version of Hej
    #[error("Database schema version {current} is newer than supported version {supported}")]
    SchemaTooNew {
        /// Highest version applied to the database
        current: i64,

        /// Highest version known to this build
        supported: i64,
    },

    /// The database has not been migrated to the version of this build yet
    #[error(
        "Database schema version {current} is older than supported version {supported}, start hejd to migrate it"
    )]
    SchemaOutdated {
        /// Highest version applied to the database
        current: i64,

        /// Highest version known to this build
        supported: i64,
    },

    /// The database file could not be backed up before migrating
    #[error("Backup error: {0}")]
    Backup(#[from] std::io::Error),
}

impl Error {
    /// Does this error mean the addressed row does not exist?
    pub fn is_unknown_item(&self) -> bool {
        matches!(self, Self::UnknownItem { .. })
    }
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Turn a missing row into `None`, any other error is kept
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_unknown_item() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Where the database lives
#[derive(Clone, Debug, PartialEq, Eq)]
enum Location {
    /// A database file, created when missing
    File(PathBuf),

    /// A private in-memory database, gone when the connection closes
    Memory,
}

/// Database configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Where the database lives
    location: Location,

    /// Directory with migration scripts, the embedded scripts are used when not set
    migrations_path: Option<PathBuf>,
}

impl Config {
    /// Use a database file
    pub fn file<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            location: Location::File(path.into()),
            migrations_path: None,
        }
    }

    /// Use an in-memory database, every connection gets its own
    pub fn memory() -> Self {
        Self {
            location: Location::Memory,
            migrations_path: None,
        }
    }

    /// Load migration scripts from a directory instead of the embedded ones
    #[must_use]
    pub fn with_migrations_path(mut self, migrations_path: Option<PathBuf>) -> Self {
        self.migrations_path = migrations_path;
        self
    }

    /// Path of the database file, if there is one
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Directory with migration scripts, if overridden
    pub fn migrations_path(&self) -> Option<&Path> {
        self.migrations_path.as_deref()
    }

    /// Open a new low-level connection
    async fn connect(&self) -> Result<SqliteConnection> {
        let options = match &self.location {
            Location::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            Location::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
        };

        let connection = options.connect().await?;

        Ok(connection)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.location {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Memory => write!(f, ":memory:"),
        }
    }
}

/// Open a connection, run `scope` with it and close it again
pub async fn open_db<T, E, F>(config: &Config, scope: F) -> core::result::Result<T, E>
where
    F: for<'d> FnOnce(&'d mut Database) -> ScopeFuture<'d, T, E>,
    E: From<Error>,
{
    let mut database = Database::open(config).await?;

    let result = scope(&mut database).await;

    release(database, result).await
}

/// Open a connection and a transaction on it, run `scope` inside the transaction
///
/// The transaction commits when `scope` returns `Ok` and rolls back otherwise, after which the
/// connection is closed.
pub async fn open_transaction<T, E, F>(config: &Config, scope: F) -> core::result::Result<T, E>
where
    F: for<'t> FnOnce(&'t mut Transaction<'_>) -> ScopeFuture<'t, T, E>,
    E: From<Error>,
{
    let mut database = Database::open(config).await?;

    let result = database.transaction(scope).await;

    release(database, result).await
}

/// Close the connection, an error while closing only wins when the scope itself succeeded
async fn release<T, E>(
    mut database: Database,
    result: core::result::Result<T, E>,
) -> core::result::Result<T, E>
where
    E: From<Error>,
{
    if let Err(err) = database.close().await {
        if result.is_ok() {
            return Err(err.into());
        }

        tracing::warn!("Could not close database after failed scope: {err}");
    }

    result
}
