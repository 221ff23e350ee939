//! Thin statement decorators
//!
//! Statement wrappers forward execution to the connection's client and add
//! three things: the connection's fixed query timeout around every
//! execution, a bump of the parent's execution counter, and a refreshed
//! last-used timestamp. A wrapper never outlives its connection; it borrows
//! it for its whole lifetime.

use crate::connection::TrackedConnection;
use crate::error::{DbTrackError, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// Run a driver future under the fixed query timeout
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, tokio_postgres::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(DbTrackError::from),
        Err(_) => Err(DbTrackError::QueryTimeout {
            seconds: limit.as_secs(),
        }),
    }
}

/// Unprepared statement execution against a tracked connection
#[derive(Debug)]
pub struct TrackedStatement<'a> {
    conn: &'a TrackedConnection,
    timeout: Duration,
}

impl<'a> TrackedStatement<'a> {
    pub(crate) const fn new(conn: &'a TrackedConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// The query timeout applied to every execution
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute a query and return all rows
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        let rows = bounded(self.timeout, self.conn.client().query(sql, params)).await?;
        self.conn.record_execution();
        Ok(rows)
    }

    /// Execute a query expected to return exactly one row
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row> {
        let row = bounded(self.timeout, self.conn.client().query_one(sql, params)).await?;
        self.conn.record_execution();
        Ok(row)
    }

    /// Execute a query expected to return at most one row
    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>> {
        let row = bounded(self.timeout, self.conn.client().query_opt(sql, params)).await?;
        self.conn.record_execution();
        Ok(row)
    }

    /// Execute a statement and return the number of rows affected
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let affected = bounded(self.timeout, self.conn.client().execute(sql, params)).await?;
        self.conn.record_execution();
        Ok(affected)
    }

    /// Execute a batch of semicolon-separated statements
    pub async fn batch_execute(&self, sql: &str) -> Result<()> {
        bounded(self.timeout, self.conn.client().batch_execute(sql)).await?;
        self.conn.record_execution();
        Ok(())
    }
}

/// A prepared statement wrapped together with its SQL text
pub struct TrackedPreparedStatement<'a> {
    conn: &'a TrackedConnection,
    stmt: tokio_postgres::Statement,
    sql: String,
    timeout: Duration,
}

impl<'a> TrackedPreparedStatement<'a> {
    pub(crate) fn new(
        conn: &'a TrackedConnection,
        stmt: tokio_postgres::Statement,
        sql: String,
        timeout: Duration,
    ) -> Self {
        Self {
            conn,
            stmt,
            sql,
            timeout,
        }
    }

    /// The SQL text this statement was prepared from
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The query timeout applied to every execution
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute the prepared statement and return all rows
    pub async fn query(&self, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let rows = bounded(self.timeout, self.conn.client().query(&self.stmt, params)).await?;
        self.conn.record_execution();
        Ok(rows)
    }

    /// Execute the prepared statement, expecting exactly one row
    pub async fn query_one(&self, params: &[&(dyn ToSql + Sync)]) -> Result<Row> {
        let row = bounded(
            self.timeout,
            self.conn.client().query_one(&self.stmt, params),
        )
        .await?;
        self.conn.record_execution();
        Ok(row)
    }

    /// Execute the prepared statement, expecting at most one row
    pub async fn query_opt(&self, params: &[&(dyn ToSql + Sync)]) -> Result<Option<Row>> {
        let row = bounded(
            self.timeout,
            self.conn.client().query_opt(&self.stmt, params),
        )
        .await?;
        self.conn.record_execution();
        Ok(row)
    }

    /// Execute the prepared statement and return the rows affected
    pub async fn execute(&self, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let affected = bounded(self.timeout, self.conn.client().execute(&self.stmt, params)).await?;
        self.conn.record_execution();
        Ok(affected)
    }
}

/// A prepared stored-procedure or function call
pub struct TrackedCall<'a> {
    conn: &'a TrackedConnection,
    stmt: tokio_postgres::Statement,
    sql: String,
    timeout: Duration,
}

impl<'a> TrackedCall<'a> {
    pub(crate) fn new(
        conn: &'a TrackedConnection,
        stmt: tokio_postgres::Statement,
        sql: String,
        timeout: Duration,
    ) -> Self {
        Self {
            conn,
            stmt,
            sql,
            timeout,
        }
    }

    /// The call text this wrapper was prepared from
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Invoke the procedure, discarding any result rows
    pub async fn execute(&self, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let affected = bounded(self.timeout, self.conn.client().execute(&self.stmt, params)).await?;
        self.conn.record_execution();
        Ok(affected)
    }

    /// Invoke a set-returning call and collect its rows
    pub async fn query(&self, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let rows = bounded(self.timeout, self.conn.client().query(&self.stmt, params)).await?;
        self.conn.record_execution();
        Ok(rows)
    }
}

impl fmt::Debug for TrackedPreparedStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedPreparedStatement")
            .field("sql", &self.sql)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for TrackedCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedCall")
            .field("sql", &self.sql)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
