use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::driver::Handle;
use crate::error::{BatchExecutionError, BatchResult, SqlMapperError};
use crate::reflection::Object;
use crate::transaction::Transaction;
use crate::types::ExecutorType;

use super::base::Strategy;
use super::close_handle;
use super::cursor::Cursor;
use super::simple::open_cursor;
use super::statement::StatementHandler;

/// Update count reported for a write that was queued rather than executed.
pub const BATCH_UPDATE_RETURN_VALUE: u64 = 0;

struct PendingStatement {
    handle: Box<dyn Handle>,
    result: BatchResult,
}

/// Writes are queued per consecutive (SQL, statement id) and executed on flush.
///
/// A flush stops at the first failing statement: the ones before it stay applied, the failing
/// one is reported, the ones after it are discarded without reaching the driver. Failing to
/// close the handle of an executed statement is logged and does not stop the flush.
#[derive(Default)]
pub struct BatchStrategy {
    pending: Vec<PendingStatement>,
}

impl BatchStrategy {
    /// Number of statements waiting for a flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn close_all(pending: Vec<PendingStatement>) {
        for mut entry in pending {
            if let Err(err) = entry.handle.close().await {
                warn!(sql = %entry.result.sql, error = %err, "failed to close batch handle");
            }
        }
    }

    async fn flush_pending(
        &mut self,
        transaction: &mut dyn Transaction,
    ) -> Result<(), SqlMapperError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.do_flush(transaction, false).await.map(|_| ())
    }
}

#[async_trait]
impl Strategy for BatchStrategy {
    const EXECUTOR_TYPE: ExecutorType = ExecutorType::Batch;

    async fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<u64, SqlMapperError> {
        let sql = handler.bound_sql().sql.clone();
        let statement_id = handler.statement().id().to_string();
        let continues_last = self.pending.last().is_some_and(|last| {
            last.result.sql == sql && last.result.statement_id == statement_id
        });
        if !continues_last {
            let connection = transaction.connection().await?;
            let handle = handler.prepare(connection.as_mut(), timeout).await?;
            self.pending.push(PendingStatement {
                handle,
                result: BatchResult::new(statement_id, sql),
            });
        }
        let Some(entry) = self.pending.last_mut() else {
            return Err(SqlMapperError::Other("batch queue is empty".into()));
        };
        handler.parameterize(entry.handle.as_mut()).await?;
        handler.batch(entry.handle.as_mut()).await?;
        entry
            .result
            .parameter_sets
            .push(handler.bound_sql().parameter_values.clone());
        Ok(BATCH_UPDATE_RETURN_VALUE)
    }

    async fn do_query(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Object>, SqlMapperError> {
        self.flush_pending(transaction).await?;
        let connection = transaction.connection().await?;
        let mut handle = handler.prepare(connection.as_mut(), timeout).await?;
        let result = async {
            handler.parameterize(handle.as_mut()).await?;
            handler.query(handle.as_mut()).await
        }
        .await;
        close_handle(result, handle.as_mut()).await
    }

    async fn do_query_cursor(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<Cursor, SqlMapperError> {
        self.flush_pending(transaction).await?;
        open_cursor(transaction, handler.as_mut(), timeout).await
    }

    async fn do_flush(
        &mut self,
        _transaction: &mut dyn Transaction,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        let pending = std::mem::take(&mut self.pending);
        if is_rollback {
            if !pending.is_empty() {
                debug!(discarded = pending.len(), "discarding queued batch statements");
            }
            Self::close_all(pending).await;
            return Ok(Vec::new());
        }

        let total = pending.len();
        let mut successful = Vec::with_capacity(total);
        let mut remaining = pending.into_iter();
        while let Some(mut entry) = remaining.next() {
            match entry.handle.execute_batch().await {
                Ok(counts) => {
                    debug!(
                        statement = %entry.result.statement_id,
                        sets = counts.len(),
                        "<==    Batch"
                    );
                    entry.result.update_counts = counts;
                    // the statement is applied; a failed release does not stop the flush
                    if let Err(err) = entry.handle.close().await {
                        warn!(sql = %entry.result.sql, error = %err, "failed to close batch handle");
                    }
                    successful.push(entry.result);
                }
                Err(err) => {
                    if let Err(close_err) = entry.handle.close().await {
                        warn!(sql = %entry.result.sql, error = %close_err, "failed to close batch handle");
                    }
                    let discarded: Vec<PendingStatement> = remaining.collect();
                    let discarded_count = discarded.len();
                    Self::close_all(discarded).await;
                    let cause = err.in_statement(
                        &entry.result.statement_id,
                        &entry.result.sql,
                        entry.result.parameter_sets.last().map_or(&[][..], Vec::as_slice),
                    );
                    return Err(SqlMapperError::Batch(BatchExecutionError {
                        successful,
                        failed: entry.result,
                        discarded: discarded_count,
                        source: Box::new(cause),
                    }));
                }
            }
        }
        Ok(successful)
    }
}
