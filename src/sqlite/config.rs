use std::time::Duration;

use crate::error::SqlMapperError;

use super::data_source::SqliteDataSource;

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// How long a statement waits on a locked database when it sets no timeout of its own.
    pub busy_timeout: Option<Duration>,
    /// Switch the database to WAL journaling when a connection is opened.
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            pool_size: 4,
            busy_timeout: None,
            wal: true,
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.opts.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a pooled [`SqliteDataSource`].
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConnectionError` if pool creation or the initial smoke test fails.
    pub async fn build(self) -> Result<SqliteDataSource, SqlMapperError> {
        SqliteDataSource::new(self.finish()).await
    }
}
