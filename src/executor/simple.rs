use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{BatchResult, SqlMapperError};
use crate::reflection::Object;
use crate::transaction::Transaction;
use crate::types::ExecutorType;

use super::base::Strategy;
use super::close_handle;
use super::cursor::Cursor;
use super::statement::StatementHandler;

/// One handle per call, closed before the call returns.
#[derive(Debug, Default)]
pub struct SimpleStrategy;

/// Prepare and bind a private handle for a cursor; the handle is closed if binding fails.
pub(crate) async fn open_cursor(
    transaction: &mut dyn Transaction,
    handler: &mut dyn StatementHandler,
    timeout: Option<Duration>,
) -> Result<Cursor, SqlMapperError> {
    let connection = transaction.connection().await?;
    let mut handle = handler.prepare(connection.as_mut(), timeout).await?;
    if let Err(err) = handler.parameterize(handle.as_mut()).await {
        if let Err(close_err) = handle.close().await {
            warn!(sql = handle.sql(), error = %close_err, "failed to close statement handle");
        }
        return Err(err);
    }
    handler.query_cursor(handle).await
}

#[async_trait]
impl Strategy for SimpleStrategy {
    const EXECUTOR_TYPE: ExecutorType = ExecutorType::Simple;

    async fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<u64, SqlMapperError> {
        let connection = transaction.connection().await?;
        let mut handle = handler.prepare(connection.as_mut(), timeout).await?;
        let result = async {
            handler.parameterize(handle.as_mut()).await?;
            handler.update(handle.as_mut()).await
        }
        .await;
        close_handle(result, handle.as_mut()).await
    }

    async fn do_query(
        &mut self,
        transaction: &mut dyn Transaction,
        mut handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Object>, SqlMapperError> {
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
        open_cursor(transaction, handler.as_mut(), timeout).await
    }

    async fn do_flush(
        &mut self,
        _transaction: &mut dyn Transaction,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        Ok(Vec::new())
    }
}
