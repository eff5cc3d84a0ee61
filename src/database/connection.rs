//! Connection handles
//!
//! A [`Database`] owns exactly one live `SQLite` connection, a [`Transaction`] borrows it for as
//! long as it is open. Both implement [`Connection`], the repository functions only need that.

use std::future::Future;
use std::pin::Pin;

use sqlx::Connection as _;
use sqlx::Sqlite;
use sqlx::SqliteConnection;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::sqlite::SqliteRow;
use tokio_stream::Stream;
use tokio_stream::StreamExt;

use super::Config;
use super::Error;
use super::Result;
use super::bootstrap;

/// A parameterized statement, build one with [`sqlx::query`] and bind the parameters
pub type SqlQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Rows of a query, fetched lazily
pub type RowStream<'c> = Pin<Box<dyn Stream<Item = Result<SqliteRow>> + Send + 'c>>;

/// Future returned by the closure of a scoped acquisition
pub type ScopeFuture<'s, T, E> =
    Pin<Box<dyn Future<Output = core::result::Result<T, E>> + Send + 's>>;

/// Query primitives shared by [`Database`] and [`Transaction`]
pub trait Connection: Send {
    /// Run a mutating statement, returns the number of affected rows
    fn execute<'q>(&mut self, query: SqlQuery<'q>) -> impl Future<Output = Result<u64>> + Send;

    /// Run a query and stream its rows
    ///
    /// Every call runs the query again, the stream borrows the connection until it is dropped
    fn execute_fetch_all<'c, 'q: 'c>(&'c mut self, query: SqlQuery<'q>) -> RowStream<'c>;

    /// Run a query expected to return at most one row
    fn execute_fetch_one<'q>(
        &mut self,
        query: SqlQuery<'q>,
    ) -> impl Future<Output = Result<Option<SqliteRow>>> + Send;
}

async fn execute_on(connection: &mut SqliteConnection, query: SqlQuery<'_>) -> Result<u64> {
    let result = query.execute(connection).await?;

    Ok(result.rows_affected())
}

fn fetch_all_on<'c, 'q: 'c>(
    connection: &'c mut SqliteConnection,
    query: SqlQuery<'q>,
) -> RowStream<'c> {
    Box::pin(query.fetch(connection).map(|row| row.map_err(Error::from)))
}

async fn fetch_one_on(
    connection: &mut SqliteConnection,
    query: SqlQuery<'_>,
) -> Result<Option<SqliteRow>> {
    let row = query.fetch_optional(connection).await?;

    Ok(row)
}

/// A single database connection
///
/// Created by [`Database::open`], released by [`Database::close`] (or when dropped). Using it
/// after it has been closed results in [`Error::Usage`].
pub struct Database {
    /// The live connection, `None` once closed
    connection: Option<SqliteConnection>,
}

impl Database {
    /// Connect to the configured database
    ///
    /// An empty database gets the schema applied first, any other database has to be up to date,
    /// see [`bootstrap::prepare`]
    pub async fn open(config: &Config) -> Result<Self> {
        let mut connection = config.connect().await?;

        if let Err(err) = bootstrap::prepare(&mut connection, config).await {
            if let Err(close_err) = connection.close().await {
                tracing::warn!(
                    "Could not close database {config} after failed bootstrap: {close_err}"
                );
            }

            return Err(err);
        }

        tracing::debug!("Opened database {config}");

        Ok(Self {
            connection: Some(connection),
        })
    }

    /// Release the connection
    ///
    /// Pending work outside of a committed transaction is lost
    pub async fn close(&mut self) -> Result<()> {
        let connection = self
            .connection
            .take()
            .ok_or(Error::Usage("database connection is already closed"))?;

        connection.close().await?;

        Ok(())
    }

    fn connection(&mut self) -> Result<&mut SqliteConnection> {
        self.connection
            .as_mut()
            .ok_or(Error::Usage("database connection is closed"))
    }

    /// Begin a transaction on this connection
    ///
    /// The transaction is rolled back when it is dropped without calling
    /// [`Transaction::commit`], this includes the future holding it being cancelled.
    pub async fn begin(&mut self) -> Result<Transaction<'_>> {
        let inner = self.connection()?.begin().await?;

        Ok(Transaction { inner })
    }

    /// Run `scope` inside a transaction
    ///
    /// Commits when `scope` returns `Ok`, rolls back when it returns `Err` and hands back that
    /// same error.
    pub async fn transaction<T, E, F>(&mut self, scope: F) -> core::result::Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_>) -> ScopeFuture<'t, T, E>,
        E: From<Error>,
    {
        let mut transaction = self.begin().await?;

        match scope(&mut transaction).await {
            Ok(value) => {
                transaction.commit().await?;

                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    tracing::warn!("Could not roll back transaction: {rollback_err}");
                }

                Err(err)
            }
        }
    }

    /// Run a single statement in its own transaction
    pub async fn execute_commit(&mut self, query: SqlQuery<'_>) -> Result<u64> {
        let mut transaction = self.begin().await?;

        let affected = transaction.execute(query).await?;

        transaction.commit().await?;

        Ok(affected)
    }

    /// Run a script of multiple statements, without parameters
    pub async fn execute_script(&mut self, script: &str) -> Result<()> {
        sqlx::raw_sql(script).execute(self.connection()?).await?;

        Ok(())
    }
}

impl Connection for Database {
    fn execute<'q>(&mut self, query: SqlQuery<'q>) -> impl Future<Output = Result<u64>> + Send {
        async move { execute_on(self.connection()?, query).await }
    }

    fn execute_fetch_all<'c, 'q: 'c>(&'c mut self, query: SqlQuery<'q>) -> RowStream<'c> {
        match self.connection() {
            Ok(connection) => fetch_all_on(connection, query),
            Err(err) => Box::pin(tokio_stream::once(Err(err))),
        }
    }

    fn execute_fetch_one<'q>(
        &mut self,
        query: SqlQuery<'q>,
    ) -> impl Future<Output = Result<Option<SqliteRow>>> + Send {
        async move { fetch_one_on(self.connection()?, query).await }
    }
}

/// An open transaction on a [`Database`] connection
///
/// Both [`commit`](Self::commit) and [`rollback`](Self::rollback) consume the transaction,
/// dropping it rolls back.
pub struct Transaction<'c> {
    inner: sqlx::Transaction<'c, Sqlite>,
}

impl Transaction<'_> {
    /// Make the work of this transaction permanent
    pub async fn commit(self) -> Result<()> {
        self.inner.commit().await?;

        Ok(())
    }

    /// Throw away the work of this transaction
    pub async fn rollback(self) -> Result<()> {
        self.inner.rollback().await?;

        Ok(())
    }
}

impl Connection for Transaction<'_> {
    fn execute<'q>(&mut self, query: SqlQuery<'q>) -> impl Future<Output = Result<u64>> + Send {
        execute_on(&mut *self.inner, query)
    }

    fn execute_fetch_all<'c, 'q: 'c>(&'c mut self, query: SqlQuery<'q>) -> RowStream<'c> {
        fetch_all_on(&mut *self.inner, query)
    }

    fn execute_fetch_one<'q>(
        &mut self,
        query: SqlQuery<'q>,
    ) -> impl Future<Output = Result<Option<SqliteRow>>> + Send {
        fetch_one_on(&mut *self.inner, query)
    }
}
