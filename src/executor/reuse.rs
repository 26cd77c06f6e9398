use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::driver::Handle;
use crate::error::{BatchResult, SqlMapperError};
use crate::reflection::Object;
use crate::transaction::Transaction;
use crate::types::ExecutorType;

use super::base::Strategy;
use super::cursor::Cursor;
use super::simple::open_cursor;
use super::statement::StatementHandler;

/// Handles cached by SQL text for the life of the executor.
///
/// Cached handles are released on flush, commit, rollback and close. A reused handle takes the
/// timeout of the call reusing it. Cursors never share a cached handle.
#[derive(Default)]
pub struct ReuseStrategy {
    statements: HashMap<String, Box<dyn Handle>>,
}

impl ReuseStrategy {
    /// Number of cached handles.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.statements.len()
    }

    async fn prepare_handle<'s>(
        &'s mut self,
        transaction: &mut dyn Transaction,
        handler: &mut dyn StatementHandler,
        timeout: Option<Duration>,
    ) -> Result<&'s mut Box<dyn Handle>, SqlMapperError> {
        let sql = handler.bound_sql().sql.clone();
        let reusable = self.statements.get(&sql).is_some_and(|h| !h.is_closed());
        if reusable {
            debug!(sql = %sql, "reusing cached statement handle");
        } else {
            let connection = transaction.connection().await?;
            let handle = handler.prepare(connection.as_mut(), timeout).await?;
            self.statements.insert(sql.clone(), handle);
        }
        let handle = self
            .statements
            .get_mut(&sql)
            .ok_or_else(|| SqlMapperError::ResourceClosed(format!("no cached handle for {sql}")))?;
        if reusable {
            handle.set_timeout(timeout);
        }
        handler.parameterize(handle.as_mut()).await?;
        Ok(handle)
    }
}

#[async_trait]
impl Strategy for ReuseStrategy {
    const EXECUTOR_TYPE: ExecutorType = ExecutorType::Reuse;

    async fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<u64, SqlMapperError> {
        let handle = self
            .prepare_handle(transaction, handler.as_mut(), timeout)
            .await?;
        handler.update(handle.as_mut()).await
    }

    async fn do_query(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Object>, SqlMapperError> {
        let handle = self
            .prepare_handle(transaction, handler.as_mut(), timeout)
            .await?;
        handler.query(handle.as_mut()).await
    }

    async fn do_query_cursor(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<Cursor, SqlMapperError> {
        open_cursor(transaction, handler.as_mut(), timeout).await
    }

    async fn do_flush(
        &mut self,
        _transaction: &mut dyn Transaction,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        let mut first_error = None;
        for (sql, mut handle) in self.statements.drain() {
            if let Err(err) = handle.close().await {
                warn!(sql = %sql, error = %err, "failed to close cached statement handle");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(Vec::new()),
        }
    }
}
