//! Statement execution.
//!
//! An [`Executor`] owns a session's transaction and turns a statement plus a parameter object
//! into driver calls. The shared bookkeeping (closed state, local cache, timeouts) lives in
//! [`BaseExecutor`]; how handles are created and released is the job of its [`Strategy`]:
//!
//! - [`SimpleStrategy`]: one handle per call, closed before the call returns.
//! - [`ReuseStrategy`]: handles cached by SQL text until flush, commit, rollback or close.
//! - [`BatchStrategy`]: writes queued per SQL text and sent to the driver on flush.
//!
//! [`CachingExecutor`] decorates any of them with the shared second-level cache.

pub mod base;
pub mod batch;
pub mod caching;
pub mod cursor;
pub mod result_handler;
pub mod reuse;
pub mod simple;
pub mod statement;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::CacheKey;
use crate::driver::Handle;
use crate::error::{BatchResult, SqlMapperError};
use crate::mapping::{BoundSql, MappedStatement, Parameter};
use crate::plugin::Pluggable;
use crate::reflection::Object;
use crate::types::RowBounds;

pub use base::{BaseExecutor, Strategy};
pub use batch::{BATCH_UPDATE_RETURN_VALUE, BatchStrategy};
pub use caching::CachingExecutor;
pub use cursor::Cursor;
pub use result_handler::RowMapper;
pub use reuse::ReuseStrategy;
pub use simple::SimpleStrategy;
pub use statement::{DefaultStatementHandler, StatementHandler};

pub type SimpleExecutor = BaseExecutor<SimpleStrategy>;
pub type ReuseExecutor = BaseExecutor<ReuseStrategy>;
pub type BatchExecutor = BaseExecutor<BatchStrategy>;

/// Execution engine of one session.
///
/// Every operation on a closed executor fails with `SqlMapperError::ResourceClosed`.
#[async_trait]
pub trait Executor: Pluggable + Send {
    /// Execute an insert, update or delete and return the affected row count.
    async fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
    ) -> Result<u64, SqlMapperError>;

    /// Execute a select and map its rows inside `bounds`.
    async fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Vec<Object>, SqlMapperError>;

    /// Execute a select whose rows are mapped lazily by the returned cursor.
    async fn query_cursor(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Cursor, SqlMapperError>;

    /// Send pending work to the driver; empty for strategies that never defer.
    async fn flush_statements(
        &mut self,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError>;

    async fn commit(&mut self, required: bool) -> Result<(), SqlMapperError>;

    async fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError>;

    /// Roll back if `force_rollback`, then release the transaction.
    async fn close(&mut self, force_rollback: bool) -> Result<(), SqlMapperError>;

    fn is_closed(&self) -> bool;

    fn clear_local_cache(&mut self);

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> CacheKey;
}

/// Close `handle` after `result` was produced with it.
///
/// The first error wins: a close failure is only surfaced when the call itself succeeded.
pub(crate) async fn close_handle<T>(
    result: Result<T, SqlMapperError>,
    handle: &mut dyn Handle,
) -> Result<T, SqlMapperError> {
    let closed = handle.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(sql = handle.sql(), error = %close_err, "failed to close statement handle");
            Err(err)
        }
    }
}
