use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::{Cache, CacheKey, TransactionalCacheManager};
use crate::error::{BatchResult, SqlMapperError};
use crate::mapping::{BoundSql, MappedStatement, Parameter};
use crate::plugin::{Capability, Pluggable};
use crate::reflection::Object;
use crate::session::Configuration;
use crate::types::RowBounds;

use super::Executor;
use super::cursor::Cursor;

/// Second-level cache decorator.
///
/// Statements bound to a cache namespace read through the shared cache registered on the
/// configuration. Results are staged per session and only become visible to other sessions
/// after commit.
pub struct CachingExecutor {
    delegate: Box<dyn Executor>,
    configuration: Arc<Configuration>,
    tcm: TransactionalCacheManager,
}

impl CachingExecutor {
    #[must_use]
    pub fn new(delegate: Box<dyn Executor>, configuration: Arc<Configuration>) -> Self {
        Self {
            delegate,
            configuration,
            tcm: TransactionalCacheManager::new(),
        }
    }

    fn shared_cache(&self, statement: &MappedStatement) -> Option<Arc<dyn Cache>> {
        statement
            .cache_namespace()
            .and_then(|namespace| self.configuration.cache(namespace))
    }

    fn flush_cache_if_required(&mut self, statement: &MappedStatement) {
        if statement.flush_cache()
            && let Some(cache) = self.shared_cache(statement)
        {
            debug!(cache = cache.id(), statement = statement.id(), "clearing shared cache");
            self.tcm.clear(&cache);
        }
    }
}

impl Pluggable for CachingExecutor {
    fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities = self.delegate.capabilities();
        if !capabilities.contains(&Capability::Executor) {
            capabilities.push(Capability::Executor);
        }
        capabilities
    }
}

#[async_trait]
impl Executor for CachingExecutor {
    async fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
    ) -> Result<u64, SqlMapperError> {
        self.flush_cache_if_required(statement);
        self.delegate.update(statement, parameter).await
    }

    async fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Vec<Object>, SqlMapperError> {
        if self.delegate.is_closed() {
            return Err(SqlMapperError::ResourceClosed("Executor was closed.".into()));
        }
        let Some(cache) = self.shared_cache(statement) else {
            return self.delegate.query(statement, parameter, bounds).await;
        };
        self.flush_cache_if_required(statement);
        if !statement.use_cache() {
            return self.delegate.query(statement, parameter, bounds).await;
        }
        let bound_sql = statement.bound_sql(parameter)?;
        let key = self.delegate.create_cache_key(statement, bounds, &bound_sql);
        if let Some(hit) = self.tcm.get(&cache, &key) {
            debug!(cache = cache.id(), statement = statement.id(), "shared cache hit");
            return Ok(hit);
        }
        let list = self.delegate.query(statement, parameter, bounds).await?;
        self.tcm.put(&cache, key, list.clone());
        Ok(list)
    }

    async fn query_cursor(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Cursor, SqlMapperError> {
        self.flush_cache_if_required(statement);
        self.delegate.query_cursor(statement, parameter, bounds).await
    }

    async fn flush_statements(
        &mut self,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.delegate.flush_statements(is_rollback).await
    }

    async fn commit(&mut self, required: bool) -> Result<(), SqlMapperError> {
        self.delegate.commit(required).await?;
        self.tcm.commit();
        Ok(())
    }

    async fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError> {
        let result = self.delegate.rollback(required).await;
        if required {
            self.tcm.rollback();
        }
        result
    }

    async fn close(&mut self, force_rollback: bool) -> Result<(), SqlMapperError> {
        if force_rollback {
            self.tcm.rollback();
        } else {
            self.tcm.commit();
        }
        self.delegate.close(force_rollback).await
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    fn clear_local_cache(&mut self) {
        self.delegate.clear_local_cache();
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> CacheKey {
        self.delegate.create_cache_key(statement, bounds, bound_sql)
    }
}
