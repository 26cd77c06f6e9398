use std::time::Duration;

use async_trait::async_trait;
use bb8::Pool;
use tracing::debug;

use crate::driver::{Connection, DataSource};
use crate::error::SqlMapperError;

use super::config::SqliteOptions;
use super::connection::SqliteConnection;
use super::manager::SqliteManager;
use super::run_blocking;

/// Pooled `SQLite` data source.
#[derive(Clone)]
pub struct SqliteDataSource {
    pool: Pool<SqliteManager>,
    busy_timeout: Option<Duration>,
}

impl std::fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDataSource")
            .field("state", &self.pool.state())
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

impl SqliteDataSource {
    /// Create the pool and run a smoke test on one connection.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if pool creation or the smoke test fails.
    pub async fn new(options: SqliteOptions) -> Result<Self, SqlMapperError> {
        let manager = SqliteManager::new(options.db_path.clone(), options.wal);
        let pool = Pool::builder()
            .max_size(options.pool_size)
            .build(manager)
            .await
            .map_err(|e| SqlMapperError::ConnectionError(format!("Failed to create SQLite pool: {e}")))?;

        {
            let conn = pool
                .get_owned()
                .await
                .map_err(|e| SqlMapperError::ConnectionError(format!("Failed to create SQLite pool: {e}")))?;
            let shared = (*conn).clone();
            run_blocking(shared, |conn| {
                conn.execute_batch("SELECT 1")
                    .map_err(SqlMapperError::SqliteError)
            })
            .await?;
        }

        debug!(db_path = %options.db_path, pool_size = options.pool_size, "sqlite pool ready");
        Ok(Self {
            pool,
            busy_timeout: options.busy_timeout,
        })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    async fn get_connection(&self) -> Result<Box<dyn Connection>, SqlMapperError> {
        let pooled = self.pool.get_owned().await.map_err(|e| {
            SqlMapperError::ConnectionError(format!("sqlite checkout error: {e}"))
        })?;
        Ok(Box::new(SqliteConnection::pooled(pooled, self.busy_timeout)))
    }
}
