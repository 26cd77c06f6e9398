//! Driver seam: the three traits a database backend implements.
//!
//! The executor only ever talks to a database through these. The `SQLite` backend lives in
//! [`crate::sqlite`]; the fault-injecting mock used by the test-suite lives in
//! `crate::test_utils`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SqlMapperError;
use crate::results::CustomDbRow;
use crate::types::{IsolationLevel, RowValues};

/// Source of fresh connections, usually a pool.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Acquire a connection.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` when no connection can be obtained.
    async fn get_connection(&self) -> Result<Box<dyn Connection>, SqlMapperError>;
}

/// One database connection.
#[async_trait]
pub trait Connection: Send {
    /// Prepare `sql` into a handle. The timeout bounds how long the driver waits on locks.
    async fn prepare(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Handle>, SqlMapperError>;

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), SqlMapperError>;

    async fn auto_commit(&mut self) -> Result<bool, SqlMapperError>;

    async fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), SqlMapperError>;

    async fn commit(&mut self) -> Result<(), SqlMapperError>;

    async fn rollback(&mut self) -> Result<(), SqlMapperError>;

    /// Release the connection. Pooled connections go back to their pool.
    async fn close(&mut self) -> Result<(), SqlMapperError>;
}

/// A prepared statement owning driver resources until [`close`](Handle::close).
///
/// Closing a handle never closes the connection that issued it.
#[async_trait]
pub trait Handle: Send {
    fn sql(&self) -> &str;

    /// Bind a value to the 1-based placeholder `index`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` for index `0` and `ResourceClosed` after close.
    fn bind(&mut self, index: usize, value: &RowValues) -> Result<(), SqlMapperError>;

    fn clear_bindings(&mut self);

    /// Replace the timeout the handle was prepared with; `None` falls back to the connection's
    /// default.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Execute with the current bindings, returning the number of affected rows.
    async fn execute_update(&mut self) -> Result<u64, SqlMapperError>;

    /// Execute with the current bindings; rows are then read with [`next_row`](Handle::next_row).
    async fn execute_query(&mut self) -> Result<(), SqlMapperError>;

    /// Column labels of the last executed query.
    fn columns(&self) -> &[String];

    async fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlMapperError>;

    /// Queue the current bindings as one parameter set of a batch.
    fn add_batch(&mut self) -> Result<(), SqlMapperError>;

    /// Execute every queued parameter set, returning one update count per set.
    async fn execute_batch(&mut self) -> Result<Vec<u64>, SqlMapperError>;

    async fn close(&mut self) -> Result<(), SqlMapperError>;

    fn is_closed(&self) -> bool;
}
