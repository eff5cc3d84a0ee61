//! Schema setup
//!
//! A fresh database gets the complete schema when it is opened for the first time. Existing
//! databases are brought up to date by [`migrate`], which `hejd` runs before it starts serving.
//! Until then they are refused when opened.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use chrono::Utc;
use sqlx::Connection as _;
use sqlx::SqliteConnection;
use sqlx::migrate::Migrate;
use sqlx::migrate::Migrator;

use super::Config;
use super::Error;
use super::Result;

/// Migration scripts shipped with the binary
static MIGRATOR: Migrator = sqlx::migrate!();

/// Table used by `SQLx` to track applied migrations
const MIGRATIONS_TABLE: &str = "_sqlx_migrations";

/// Where the migration scripts come from
enum Migrations {
    Embedded,
    Directory(Migrator),
}

impl Migrations {
    async fn load(config: &Config) -> Result<Self> {
        match config.migrations_path() {
            Some(path) => {
                tracing::debug!("Loading migrations from {}", path.display());

                let migrator = Migrator::new(path.to_path_buf()).await?;

                Ok(Self::Directory(migrator))
            }
            None => Ok(Self::Embedded),
        }
    }

    fn migrator(&self) -> &Migrator {
        match self {
            Self::Embedded => &MIGRATOR,
            Self::Directory(migrator) => migrator,
        }
    }

    /// Versions of the scripts, in order
    fn versions(&self) -> Vec<i64> {
        self.migrator()
            .iter()
            .filter(|migration| !migration.migration_type.is_down_migration())
            .map(|migration| migration.version)
            .collect()
    }
}

/// Prepare a freshly opened connection
///
/// An empty database gets the full schema, any other database has to be at the schema version
/// of this build.
pub async fn prepare(connection: &mut SqliteConnection, config: &Config) -> Result<()> {
    let migrations = Migrations::load(config).await?;

    if initialize(connection, &migrations, config).await? {
        return Ok(());
    }

    verify(connection, &migrations).await
}

/// Apply the full schema to an empty database, returns whether it did
///
/// A database with anything in `sqlite_master` is left alone.
async fn initialize(
    connection: &mut SqliteConnection,
    migrations: &Migrations,
    config: &Config,
) -> Result<bool> {
    let (entries,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sqlite_master")
        .fetch_one(&mut *connection)
        .await?;

    if entries > 0 {
        return Ok(false);
    }

    tracing::debug!("Initializing empty database {config}");

    migrations.migrator().run_direct(&mut *connection).await?;

    Ok(true)
}

/// Refuse a schema that differs from the scripts of this build
async fn verify(connection: &mut SqliteConnection, migrations: &Migrations) -> Result<()> {
    let applied = applied_versions(connection).await?;
    let known = migrations.versions();

    let current = applied.iter().copied().max().unwrap_or_default();
    let supported = known.iter().copied().max().unwrap_or_default();

    if current > supported {
        return Err(Error::SchemaTooNew { current, supported });
    }

    if known.iter().any(|version| !applied.contains(version)) {
        return Err(Error::SchemaOutdated { current, supported });
    }

    Ok(())
}

/// Bring the database schema up to date
///
/// Returns the versions that have been applied, empty when the database was already up to date.
/// An existing database file is copied to `<file>.<timestamp>.bak` before anything changes.
pub async fn migrate(config: &Config) -> Result<Vec<i64>> {
    let migrations = Migrations::load(config).await?;

    // checked before connecting, connecting creates the file
    let existed = config.path().is_some_and(Path::exists);

    let mut connection = config.connect().await?;

    let result = migrate_connection(&mut connection, &migrations, config, existed).await;

    if let Err(err) = connection.close().await {
        if result.is_ok() {
            return Err(err.into());
        }

        tracing::warn!("Could not close database {config} after failed migration: {err}");
    }

    result
}

async fn migrate_connection(
    connection: &mut SqliteConnection,
    migrations: &Migrations,
    config: &Config,
    existed: bool,
) -> Result<Vec<i64>> {
    let applied = applied_versions(connection).await?;
    let known = migrations.versions();

    let current = applied.iter().copied().max().unwrap_or_default();
    let supported = known.iter().copied().max().unwrap_or_default();

    if current > supported {
        return Err(Error::SchemaTooNew { current, supported });
    }

    let applied: HashSet<i64> = applied.into_iter().collect();
    let pending: Vec<i64> = known
        .into_iter()
        .filter(|version| !applied.contains(version))
        .collect();

    if pending.is_empty() {
        tracing::debug!("Database {config} is up to date at version {current}");

        return Ok(pending);
    }

    if existed && let Some(path) = config.path() {
        let backup = backup_path(path);

        tokio::fs::copy(path, &backup).await?;

        tracing::info!("Backed up database {config} to {}", backup.display());
    }

    tracing::info!("Migrating database {config} from version {current} to {supported}");

    migrations.migrator().run_direct(&mut *connection).await?;

    Ok(pending)
}

/// Versions already applied to the database, empty when it has never been migrated
async fn applied_versions(connection: &mut SqliteConnection) -> Result<Vec<i64>> {
    let (tables,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(MIGRATIONS_TABLE)
            .fetch_one(&mut *connection)
            .await?;

    if tables == 0 {
        return Ok(Vec::new());
    }

    let applied = connection.list_applied_migrations().await?;

    Ok(applied.into_iter().map(|migration| migration.version).collect())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut backup = OsString::from(path.as_os_str());
    backup.push(format!(".{}.bak", Utc::now().format("%Y%m%dT%H%M%S")));

    PathBuf::from(backup)
}
