use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::driver::{Connection, Handle};
use crate::error::SqlMapperError;
use crate::mapping::{BoundSql, MappedStatement};
use crate::plugin::{Capability, Pluggable};
use crate::reflection::Object;
use crate::types::RowBounds;

use super::cursor::Cursor;
use super::result_handler::{RowMapper, collect_rows};

/// Per-call worker that talks to the driver for one statement and one parameter object.
///
/// Created by the configuration and wrapped by the interceptor chain, so each of its
/// operations is interceptable.
#[async_trait]
pub trait StatementHandler: Pluggable + Send {
    fn statement(&self) -> &Arc<MappedStatement>;

    fn bound_sql(&self) -> &BoundSql;

    /// Prepare the bound SQL on `connection`.
    async fn prepare(
        &mut self,
        connection: &mut dyn Connection,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Handle>, SqlMapperError>;

    /// Replace the handle's bindings with the bound parameter values.
    async fn parameterize(&mut self, handle: &mut dyn Handle) -> Result<(), SqlMapperError>;

    async fn update(&mut self, handle: &mut dyn Handle) -> Result<u64, SqlMapperError>;

    async fn query(&mut self, handle: &mut dyn Handle) -> Result<Vec<Object>, SqlMapperError>;

    /// Execute and hand the handle over to a cursor.
    async fn query_cursor(&mut self, handle: Box<dyn Handle>) -> Result<Cursor, SqlMapperError>;

    /// Queue the current bindings as one parameter set.
    async fn batch(&mut self, handle: &mut dyn Handle) -> Result<(), SqlMapperError>;
}

/// The statement handler used for every mapped statement.
#[derive(Debug)]
pub struct DefaultStatementHandler {
    statement: Arc<MappedStatement>,
    bound_sql: BoundSql,
    bounds: RowBounds,
    mapper: RowMapper,
}

impl DefaultStatementHandler {
    #[must_use]
    pub fn new(
        statement: Arc<MappedStatement>,
        bound_sql: BoundSql,
        bounds: RowBounds,
        mapper: RowMapper,
    ) -> Self {
        Self {
            statement,
            bound_sql,
            bounds,
            mapper,
        }
    }

    fn context(&self, err: SqlMapperError) -> SqlMapperError {
        err.in_statement(
            self.statement.id(),
            &self.bound_sql.sql,
            &self.bound_sql.parameter_values,
        )
    }
}

impl Pluggable for DefaultStatementHandler {
    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::StatementHandler]
    }
}

#[async_trait]
impl StatementHandler for DefaultStatementHandler {
    fn statement(&self) -> &Arc<MappedStatement> {
        &self.statement
    }

    fn bound_sql(&self) -> &BoundSql {
        &self.bound_sql
    }

    async fn prepare(
        &mut self,
        connection: &mut dyn Connection,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Handle>, SqlMapperError> {
        debug!(statement = self.statement.id(), sql = %self.bound_sql.sql, "==>  Preparing");
        connection
            .prepare(&self.bound_sql.sql, timeout)
            .await
            .map_err(|e| self.context(e))
    }

    async fn parameterize(&mut self, handle: &mut dyn Handle) -> Result<(), SqlMapperError> {
        handle.clear_bindings();
        for (idx, value) in self.bound_sql.parameter_values.iter().enumerate() {
            handle.bind(idx + 1, value).map_err(|e| self.context(e))?;
        }
        debug!(parameters = ?self.bound_sql.parameter_values, "==> Parameters");
        Ok(())
    }

    async fn update(&mut self, handle: &mut dyn Handle) -> Result<u64, SqlMapperError> {
        let count = handle.execute_update().await.map_err(|e| self.context(e))?;
        debug!(updates = count, "<==    Updates");
        Ok(count)
    }

    async fn query(&mut self, handle: &mut dyn Handle) -> Result<Vec<Object>, SqlMapperError> {
        handle.execute_query().await.map_err(|e| self.context(e))?;
        let rows = collect_rows(handle, &self.mapper, self.bounds)
            .await
            .map_err(|e| self.context(e))?;
        debug!(total = rows.len(), "<==      Total");
        Ok(rows)
    }

    async fn query_cursor(
        &mut self,
        mut handle: Box<dyn Handle>,
    ) -> Result<Cursor, SqlMapperError> {
        if let Err(err) = handle.execute_query().await {
            if let Err(close_err) = handle.close().await {
                warn!(sql = handle.sql(), error = %close_err, "failed to close statement handle");
            }
            return Err(self.context(err));
        }
        Ok(Cursor::new(
            self.statement.id(),
            handle,
            self.mapper.clone(),
            self.bounds,
        ))
    }

    async fn batch(&mut self, handle: &mut dyn Handle) -> Result<(), SqlMapperError> {
        handle.add_batch().map_err(|e| self.context(e))
    }
}
