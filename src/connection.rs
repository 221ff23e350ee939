//! The tracked connection wrapper
//!
//! [`TrackedConnection`] is a thin decorator over a [`tokio_postgres::Client`].
//! Nearly all of its surface forwards to the client; what it adds is
//! bookkeeping a connection owner needs: the server-side backend pid fetched
//! via a side-channel query, creation and last-used timestamps, a mutable
//! bad-connection flag, an execution counter, tiered logging of slow liveness
//! probes, and a fixed query timeout stamped onto every statement wrapper it
//! creates. Commit and rollback re-enable autocommit, so a connection handed
//! back after a transaction is always in its default mode.

use crate::config::{Config, TimeoutConfig};
use crate::error::{DbTrackError, Result};
use crate::liveness::LivenessThresholds;
use crate::session::{is_valid_identifier, IsolationLevel};
use crate::statement::{TrackedCall, TrackedPreparedStatement, TrackedStatement};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};

/// Instrumented wrapper around a single database connection
pub struct TrackedConnection {
    client: Client,
    backend_pid: Option<i32>,
    created_at: DateTime<Utc>,
    last_used_ms: AtomicI64,
    bad: AtomicBool,
    autocommit: AtomicBool,
    statements_executed: AtomicU64,
    query_timeout: Duration,
    liveness_timeout: Duration,
    thresholds: LivenessThresholds,
}

impl TrackedConnection {
    /// Connect to the database described by `config` and wrap the client.
    ///
    /// The password is read from the environment variable named in the
    /// config and never logged. The driver task is spawned onto the current
    /// runtime; its terminal error, if any, is logged when the connection
    /// goes away. The new connection is tagged with its backend pid before
    /// being returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the connect attempt fails or exceeds the
    /// configured connect timeout.
    pub async fn connect(config: &Config) -> Result<Self> {
        let db = &config.database;
        info!(
            "Connecting to {}:{} as {} (dbname={})",
            db.host, db.port, db.user, db.dbname
        );

        let connection_string = db.connection_string();
        let connect = tokio_postgres::connect(&connection_string, NoTls);
        let (client, connection) = tokio::time::timeout(config.timeouts.connect_timeout(), connect)
            .await
            .map_err(|_| DbTrackError::ConnectTimeout {
                seconds: config.timeouts.connect_timeout_secs,
            })??;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Connection task ended with error: {e}");
            }
        });

        let mut conn = Self::from_client(client, &config.timeouts);
        conn.tag().await;
        Ok(conn)
    }

    /// Wrap an already-established client.
    ///
    /// The caller keeps responsibility for driving the connection task.
    /// The wrapper starts untagged; call [`tag`](Self::tag) to fetch the
    /// backend pid.
    #[must_use]
    pub fn from_client(client: Client, timeouts: &TimeoutConfig) -> Self {
        let now = Utc::now();
        Self {
            client,
            backend_pid: None,
            created_at: now,
            last_used_ms: AtomicI64::new(now.timestamp_millis()),
            bad: AtomicBool::new(false),
            autocommit: AtomicBool::new(true),
            statements_executed: AtomicU64::new(0),
            query_timeout: timeouts.query_timeout(),
            liveness_timeout: timeouts.liveness_check(),
            thresholds: LivenessThresholds::default(),
        }
    }

    /// Fetch the server-side backend pid that identifies this session.
    ///
    /// A failed fetch is logged and leaves the pid unset; a wrapper without
    /// a pid is still fully usable.
    pub async fn tag(&mut self) {
        if self.client.is_closed() {
            return;
        }
        let fetched = self
            .client
            .query_one("SELECT pg_backend_pid()", &[])
            .await
            .and_then(|row| row.try_get(0));
        match fetched {
            Ok(pid) => {
                debug!("Tagged connection with backend pid {pid}");
                self.backend_pid = Some(pid);
            }
            Err(e) => error!("Error fetching backend pid: {e}"),
        }
    }

    /// The backend pid this session was tagged with, if the fetch succeeded
    #[must_use]
    pub const fn backend_pid(&self) -> Option<i32> {
        self.backend_pid
    }

    /// When this wrapper was created
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Override the creation timestamp
    pub fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }

    /// When this connection last executed a statement or was touched
    #[must_use]
    pub fn last_used(&self) -> DateTime<Utc> {
        let ms = self.last_used_ms.load(Ordering::Relaxed);
        DateTime::from_timestamp_millis(ms).unwrap_or(self.created_at)
    }

    /// Refresh the last-used timestamp to now
    pub fn touch(&self) {
        self.last_used_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Time since this wrapper was created
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    /// Time since this connection was last used
    #[must_use]
    pub fn idle_for(&self) -> chrono::Duration {
        Utc::now() - self.last_used()
    }

    /// Number of statements executed through this wrapper
    #[must_use]
    pub fn statements_executed(&self) -> u64 {
        self.statements_executed.load(Ordering::Relaxed)
    }

    /// Whether the owner has flagged this connection as bad
    #[must_use]
    pub fn is_bad(&self) -> bool {
        self.bad.load(Ordering::Relaxed)
    }

    /// Flag this connection as bad
    pub fn mark_bad(&self) {
        self.bad.store(true, Ordering::Relaxed);
        warn!(
            "Connection with backend pid {} marked bad",
            self.backend_pid.unwrap_or(0)
        );
    }

    /// Clear the bad-connection flag
    pub fn clear_bad(&self) {
        self.bad.store(false, Ordering::Relaxed);
    }

    /// The fixed query timeout stamped onto statements created here
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Replace the thresholds used for slow liveness-check logging
    pub fn set_liveness_thresholds(&mut self, thresholds: LivenessThresholds) {
        self.thresholds = thresholds;
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn record_execution(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    // Statement factories

    /// Create a statement wrapper carrying this connection's query timeout
    #[must_use]
    pub fn statement(&self) -> TrackedStatement<'_> {
        TrackedStatement::new(self, self.query_timeout)
    }

    /// Prepare a statement and wrap it together with its SQL text.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the statement.
    pub async fn prepare(&self, sql: &str) -> Result<TrackedPreparedStatement<'_>> {
        let stmt = self.client.prepare(sql).await?;
        Ok(TrackedPreparedStatement::new(
            self,
            stmt,
            sql.to_string(),
            self.query_timeout,
        ))
    }

    /// Prepare a stored-procedure or function call.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the statement.
    pub async fn prepare_call(&self, sql: &str) -> Result<TrackedCall<'_>> {
        let stmt = self.client.prepare(sql).await?;
        Ok(TrackedCall::new(
            self,
            stmt,
            sql.to_string(),
            self.query_timeout,
        ))
    }

    /// Execute raw SQL, bypassing statement wrappers.
    ///
    /// Bumps the execution counter like the wrappers do but does not apply
    /// the query timeout; callers using this path manage their own bounds.
    pub async fn batch_execute(&self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await?;
        self.record_execution();
        Ok(())
    }

    // Transaction control

    /// Whether this connection is currently in autocommit mode
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.autocommit.load(Ordering::SeqCst)
    }

    /// Open a transaction, leaving autocommit mode.
    ///
    /// A no-op when a transaction is already open.
    pub async fn begin(&self) -> Result<()> {
        if self.autocommit.load(Ordering::SeqCst) {
            self.client.batch_execute("BEGIN").await?;
            self.autocommit.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Commit the current transaction and re-enable autocommit
    pub async fn commit(&self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        self.autocommit.store(true, Ordering::SeqCst);
        self.touch();
        Ok(())
    }

    /// Roll back the current transaction and re-enable autocommit
    pub async fn rollback(&self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        self.autocommit.store(true, Ordering::SeqCst);
        self.touch();
        Ok(())
    }

    /// Switch autocommit mode, opening or committing a transaction as needed.
    ///
    /// A no-op when the mode already matches.
    pub async fn set_autocommit(&self, autocommit: bool) -> Result<()> {
        if autocommit == self.autocommit() {
            return Ok(());
        }
        if autocommit {
            self.commit().await
        } else {
            self.begin().await
        }
    }

    // Savepoints

    /// Create a named savepoint in the current transaction
    pub async fn savepoint(&self, name: &str) -> Result<()> {
        let name = validated(name)?;
        self.client
            .batch_execute(&format!("SAVEPOINT {name}"))
            .await?;
        Ok(())
    }

    /// Release a named savepoint
    pub async fn release_savepoint(&self, name: &str) -> Result<()> {
        let name = validated(name)?;
        self.client
            .batch_execute(&format!("RELEASE SAVEPOINT {name}"))
            .await?;
        Ok(())
    }

    /// Roll back to a named savepoint.
    ///
    /// The enclosing transaction stays open; autocommit is untouched.
    pub async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        let name = validated(name)?;
        self.client
            .batch_execute(&format!("ROLLBACK TO SAVEPOINT {name}"))
            .await?;
        Ok(())
    }

    // Session attributes

    /// Put the session's default transactions in read-only mode
    pub async fn set_read_only(&self, read_only: bool) -> Result<()> {
        let sql = if read_only {
            "SET default_transaction_read_only = on"
        } else {
            "SET default_transaction_read_only = off"
        };
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    /// Whether the session's default transactions are read-only
    pub async fn is_read_only(&self) -> Result<bool> {
        let row = self
            .client
            .query_one("SHOW default_transaction_read_only", &[])
            .await?;
        let value: String = row.try_get(0)?;
        Ok(value == "on")
    }

    /// Set the session's default transaction isolation level
    pub async fn set_isolation(&self, level: IsolationLevel) -> Result<()> {
        self.client
            .batch_execute(&format!(
                "SET default_transaction_isolation = '{}'",
                level.as_sql()
            ))
            .await?;
        Ok(())
    }

    /// The session's default transaction isolation level.
    ///
    /// Returns `None` if the server reports a spelling this crate does not
    /// know.
    pub async fn isolation(&self) -> Result<Option<IsolationLevel>> {
        let row = self
            .client
            .query_one("SHOW default_transaction_isolation", &[])
            .await?;
        let value: String = row.try_get(0)?;
        Ok(IsolationLevel::from_show(&value))
    }

    /// The schema name resolution currently lands in, if any
    pub async fn schema(&self) -> Result<Option<String>> {
        let row = self.client.query_one("SELECT current_schema()", &[]).await?;
        let value: Option<String> = row.try_get(0)?;
        Ok(value)
    }

    /// Point the session's `search_path` at a single schema
    pub async fn set_schema(&self, schema: &str) -> Result<()> {
        let schema = validated(schema)?;
        self.client
            .batch_execute(&format!("SET search_path TO {schema}"))
            .await?;
        Ok(())
    }

    /// The database this session is connected to
    pub async fn catalog(&self) -> Result<String> {
        let row = self
            .client
            .query_one("SELECT current_database()", &[])
            .await?;
        let value: String = row.try_get(0)?;
        Ok(value)
    }

    /// Set the session's application name, visible in `pg_stat_activity`
    pub async fn set_application_name(&self, name: &str) -> Result<()> {
        self.client
            .execute(
                "SELECT set_config('application_name', $1, false)",
                &[&name],
            )
            .await?;
        Ok(())
    }

    /// The session's application name; empty when unset
    pub async fn application_name(&self) -> Result<String> {
        let row = self.client.query_one("SHOW application_name", &[]).await?;
        let value: String = row.try_get(0)?;
        Ok(value)
    }

    /// The server version string
    pub async fn server_version(&self) -> Result<String> {
        let row = self.client.query_one("SELECT version()", &[]).await?;
        let value: String = row.try_get(0)?;
        Ok(value)
    }

    // Liveness

    /// Whether the underlying client has shut down
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Probe the server with a round trip and time it.
    ///
    /// The elapsed time goes through the tiered slow-check logging; a probe
    /// that fails or exceeds the liveness timeout returns `false`. A closed
    /// client returns `false` without a round trip.
    pub async fn check_liveness(&self) -> bool {
        if self.client.is_closed() {
            return false;
        }

        let started = Instant::now();
        let result =
            tokio::time::timeout(self.liveness_timeout, self.client.simple_query("SELECT 1")).await;
        let elapsed = started.elapsed();
        self.thresholds.log_slow_check(elapsed, self.backend_pid);

        match result {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(
                    "Liveness check failed on connection with backend pid {}: {e}",
                    self.backend_pid.unwrap_or(0)
                );
                false
            }
            Err(_) => {
                warn!(
                    "Liveness check timed out after {:?} on connection with backend pid {}",
                    self.liveness_timeout,
                    self.backend_pid.unwrap_or(0)
                );
                false
            }
        }
    }

    /// Consume the wrapper and drop the underlying client
    pub fn close(self) {
        debug!(
            "Closing connection with backend pid {}",
            self.backend_pid.unwrap_or(0)
        );
        drop(self.client);
    }
}

fn validated(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(DbTrackError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for TrackedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedConnection")
            .field("backend_pid", &self.backend_pid)
            .field("created_at", &self.created_at)
            .field("last_used", &self.last_used())
            .field("bad", &self.is_bad())
            .field("autocommit", &self.autocommit())
            .field("statements_executed", &self.statements_executed())
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}
