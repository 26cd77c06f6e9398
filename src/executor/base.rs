use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{Cache, CacheKey, PerpetualCache};
use crate::error::{BatchResult, SqlMapperError};
use crate::mapping::{BoundSql, MappedStatement, Parameter};
use crate::plugin::{Capability, Pluggable};
use crate::reflection::Object;
use crate::session::{Configuration, LocalCacheScope};
use crate::transaction::Transaction;
use crate::types::{ExecutorType, RowBounds};

use super::Executor;
use super::cursor::Cursor;
use super::statement::StatementHandler;

/// How an executor acquires, reuses and releases statement handles.
#[async_trait]
pub trait Strategy: Send {
    const EXECUTOR_TYPE: ExecutorType;

    async fn do_update(
        &mut self,
        transaction: &mut dyn Transaction,
        handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<u64, SqlMapperError>;

    async fn do_query(
        &mut self,
        transaction: &mut dyn Transaction,
        handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Object>, SqlMapperError>;

    async fn do_query_cursor(
        &mut self,
        transaction: &mut dyn Transaction,
        handler: Box<dyn StatementHandler>,
        timeout: Option<Duration>,
    ) -> Result<Cursor, SqlMapperError>;

    async fn do_flush(
        &mut self,
        transaction: &mut dyn Transaction,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError>;
}

/// Executor state shared by every strategy: the transaction, the session-local cache and the
/// closed flag.
pub struct BaseExecutor<S: Strategy> {
    transaction: Box<dyn Transaction>,
    configuration: Arc<Configuration>,
    local_cache: PerpetualCache,
    strategy: S,
    closed: bool,
}

impl<S: Strategy> BaseExecutor<S> {
    #[must_use]
    pub fn new(
        configuration: Arc<Configuration>,
        transaction: Box<dyn Transaction>,
        strategy: S,
    ) -> Self {
        Self {
            transaction,
            configuration,
            local_cache: PerpetualCache::new("LocalCache"),
            strategy,
            closed: false,
        }
    }

    #[must_use]
    pub fn executor_type(&self) -> ExecutorType {
        S::EXECUTOR_TYPE
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.closed {
            Err(SqlMapperError::ResourceClosed("Executor was closed.".into()))
        } else {
            Ok(())
        }
    }

    /// Statement timeout, else the transaction's, else the configured default.
    fn statement_timeout(&self, statement: &MappedStatement) -> Option<Duration> {
        statement
            .timeout()
            .or_else(|| self.transaction.timeout())
            .or_else(|| self.configuration.settings().statement_timeout())
    }

    fn handler(
        &self,
        statement: &Arc<MappedStatement>,
        bounds: RowBounds,
        bound_sql: BoundSql,
    ) -> Result<Box<dyn StatementHandler>, SqlMapperError> {
        self.configuration
            .new_statement_handler(statement, bounds, bound_sql)
    }
}

impl<S: Strategy> Pluggable for BaseExecutor<S> {
    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Executor]
    }
}

#[async_trait]
impl<S: Strategy> Executor for BaseExecutor<S> {
    async fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
    ) -> Result<u64, SqlMapperError> {
        self.ensure_open()?;
        debug!(statement = statement.id(), "executing an update");
        self.clear_local_cache();
        let bound_sql = statement.bound_sql(parameter)?;
        let handler = self.handler(statement, RowBounds::default(), bound_sql)?;
        let timeout = self.statement_timeout(statement);
        self.strategy
            .do_update(self.transaction.as_mut(), handler, timeout)
            .await
    }

    async fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Vec<Object>, SqlMapperError> {
        self.ensure_open()?;
        debug!(statement = statement.id(), "executing a query");
        let bound_sql = statement.bound_sql(parameter)?;
        let key = self.create_cache_key(statement, bounds, &bound_sql);
        if statement.flush_cache() {
            self.clear_local_cache();
        }
        if let Some(hit) = self.local_cache.get(&key) {
            debug!(statement = statement.id(), "local cache hit");
            return Ok(hit);
        }
        let handler = self.handler(statement, bounds, bound_sql)?;
        let timeout = self.statement_timeout(statement);
        let list = self
            .strategy
            .do_query(self.transaction.as_mut(), handler, timeout)
            .await?;
        if self.configuration.settings().local_cache_scope == LocalCacheScope::Statement {
            self.clear_local_cache();
        } else {
            self.local_cache.put(key, list.clone());
        }
        Ok(list)
    }

    async fn query_cursor(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Cursor, SqlMapperError> {
        self.ensure_open()?;
        debug!(statement = statement.id(), "opening a cursor");
        let bound_sql = statement.bound_sql(parameter)?;
        let handler = self.handler(statement, bounds, bound_sql)?;
        let timeout = self.statement_timeout(statement);
        self.strategy
            .do_query_cursor(self.transaction.as_mut(), handler, timeout)
            .await
    }

    async fn flush_statements(
        &mut self,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.ensure_open()?;
        self.strategy
            .do_flush(self.transaction.as_mut(), is_rollback)
            .await
    }

    async fn commit(&mut self, required: bool) -> Result<(), SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ResourceClosed(
                "Cannot commit, transaction is already closed".into(),
            ));
        }
        self.clear_local_cache();
        self.strategy
            .do_flush(self.transaction.as_mut(), false)
            .await?;
        if required {
            self.transaction.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ResourceClosed(
                "Cannot rollback, transaction is already closed".into(),
            ));
        }
        self.clear_local_cache();
        let flushed = self
            .strategy
            .do_flush(self.transaction.as_mut(), true)
            .await;
        let rolled_back = if required {
            self.transaction.rollback().await
        } else {
            Ok(())
        };
        flushed?;
        rolled_back
    }

    async fn close(&mut self, force_rollback: bool) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        if let Err(err) = self.rollback(force_rollback).await {
            warn!(error = %err, "unexpected error rolling back while closing executor");
        }
        if let Err(err) = self.transaction.close().await {
            warn!(error = %err, "unexpected error closing transaction");
        }
        self.local_cache.clear();
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn clear_local_cache(&mut self) {
        if !self.closed {
            self.local_cache.clear();
        }
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(statement.id());
        key.update(bounds.offset);
        key.update(bounds.limit);
        key.update(&bound_sql.sql);
        for value in &bound_sql.parameter_values {
            key.update_value(value);
        }
        if let Some(environment) = self.configuration.environment() {
            key.update(environment.id());
        }
        key
    }
}
