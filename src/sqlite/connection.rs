use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::PooledConnection;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::driver::{Connection, Handle};
use crate::error::SqlMapperError;
use crate::types::IsolationLevel;

use super::handle::SqliteHandle;
use super::manager::{SharedSqliteConnection, SqliteManager, open_connection};
use super::run_blocking;

enum Slot {
    // held only so the checkout lasts as long as this connection
    #[allow(dead_code)]
    Pooled(PooledConnection<'static, SqliteManager>),
    Direct,
    Released,
}

/// One `SQLite` connection, either checked out of a pool or opened directly.
///
/// Transactions are begun lazily: with auto-commit off, `BEGIN` is issued when the first
/// statement is prepared and the next commit or rollback ends it.
pub struct SqliteConnection {
    slot: Slot,
    conn: SharedSqliteConnection,
    auto_commit: bool,
    in_transaction: bool,
    busy_timeout: Option<Duration>,
}

impl SqliteConnection {
    pub(crate) fn pooled(
        pooled: PooledConnection<'static, SqliteManager>,
        busy_timeout: Option<Duration>,
    ) -> Self {
        let conn = Arc::clone(&*pooled);
        Self {
            slot: Slot::Pooled(pooled),
            conn,
            auto_commit: true,
            in_transaction: false,
            busy_timeout,
        }
    }

    /// Open an unpooled connection on `db_path`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SqliteError` if the database cannot be opened.
    pub fn open(db_path: &str) -> Result<Self, SqlMapperError> {
        let conn = open_connection(db_path, false)?;
        Ok(Self {
            slot: Slot::Direct,
            conn: Arc::new(Mutex::new(conn)),
            auto_commit: true,
            in_transaction: false,
            busy_timeout: None,
        })
    }

    /// The underlying shared connection, e.g. for schema setup.
    #[must_use]
    pub fn shared(&self) -> SharedSqliteConnection {
        Arc::clone(&self.conn)
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if matches!(self.slot, Slot::Released) {
            return Err(SqlMapperError::ResourceClosed("sqlite connection is closed".into()));
        }
        Ok(())
    }

    async fn end_transaction(&mut self, sql: &'static str) -> Result<(), SqlMapperError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        debug!(sql, "ending sqlite transaction");
        run_blocking(self.shared(), move |conn| {
            conn.execute_batch(sql).map_err(SqlMapperError::SqliteError)
        })
        .await
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn prepare(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Handle>, SqlMapperError> {
        self.ensure_open()?;
        let begin = !self.auto_commit && !self.in_transaction;
        let busy = timeout.or(self.busy_timeout);
        let owned_sql = sql.to_string();
        run_blocking(self.shared(), move |conn| {
            if let Some(busy) = busy {
                conn.busy_timeout(busy)?;
            }
            if begin {
                conn.execute_batch("BEGIN")?;
            }
            // surface syntax errors at prepare time; the statement stays in rusqlite's cache
            conn.prepare_cached(&owned_sql)?;
            Ok(())
        })
        .await?;
        if begin {
            self.in_transaction = true;
        }
        Ok(Box::new(SqliteHandle::new(
            self.shared(),
            sql.to_string(),
            timeout,
            self.busy_timeout,
        )))
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        if auto_commit && self.in_transaction {
            self.end_transaction("COMMIT").await?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    async fn auto_commit(&mut self) -> Result<bool, SqlMapperError> {
        self.ensure_open()?;
        Ok(self.auto_commit)
    }

    async fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        let pragma = match level {
            IsolationLevel::ReadUncommitted => "PRAGMA read_uncommitted = 1;",
            IsolationLevel::ReadCommitted
            | IsolationLevel::RepeatableRead
            | IsolationLevel::Serializable => "PRAGMA read_uncommitted = 0;",
        };
        run_blocking(self.shared(), move |conn| {
            conn.execute_batch(pragma).map_err(SqlMapperError::SqliteError)
        })
        .await
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.end_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.end_transaction("ROLLBACK").await
    }

    async fn close(&mut self) -> Result<(), SqlMapperError> {
        if matches!(self.slot, Slot::Released) {
            return Ok(());
        }
        if let Err(err) = self.end_transaction("ROLLBACK").await {
            warn!(error = %err, "rollback of open sqlite transaction failed on close");
        }
        // dropping the pooled guard hands the connection back to bb8
        self.slot = Slot::Released;
        Ok(())
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        self.in_transaction = false;
        // the checkout stays alive until the rollback has run
        let slot = std::mem::replace(&mut self.slot, Slot::Released);
        let conn = Arc::clone(&self.conn);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let rolled_back = run_blocking(conn, |conn| {
                    conn.execute_batch("ROLLBACK").map_err(SqlMapperError::SqliteError)
                })
                .await;
                if let Err(err) = rolled_back {
                    warn!(error = %err, "rollback of dropped sqlite connection failed");
                }
                drop(slot);
            });
        } else if let Ok(guard) = conn.try_lock()
            && let Err(err) = guard.execute_batch("ROLLBACK")
        {
            warn!(error = %err, "rollback of dropped sqlite connection failed");
        }
    }
}
