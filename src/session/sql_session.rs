use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tracing::debug;

use crate::binding::MapperProxy;
use crate::error::{BatchResult, SqlMapperError};
use crate::executor::cursor::{CursorState, close_registered};
use crate::executor::{Cursor, Executor};
use crate::mapping::{MappedStatement, Parameter};
use crate::reflection::{FromObject, Object, ObjectKey};
use crate::types::RowBounds;

use super::configuration::Configuration;

/// Receives query results one at a time.
pub trait ResultHandler: Send {
    /// Handle the `index`-th result; `Break` stops the query and releases its handle.
    fn handle_result(&mut self, result: Object, index: usize) -> ControlFlow<()>;
}

impl<F> ResultHandler for F
where
    F: FnMut(Object, usize) -> ControlFlow<()> + Send,
{
    fn handle_result(&mut self, result: Object, index: usize) -> ControlFlow<()> {
        self(result, index)
    }
}

/// One unit of work against the database.
///
/// A session owns its executor, and through it the transaction and connection. It is not
/// meant to be shared between tasks. Writes mark the session dirty, so a plain
/// [`commit`](SqlSession::commit) only reaches the driver when something was written.
pub struct SqlSession {
    configuration: Arc<Configuration>,
    executor: Box<dyn Executor>,
    auto_commit: bool,
    dirty: bool,
    closed: bool,
    cursors: Vec<Weak<Mutex<CursorState>>>,
}

impl SqlSession {
    pub(crate) fn new(
        configuration: Arc<Configuration>,
        executor: Box<dyn Executor>,
        auto_commit: bool,
    ) -> Self {
        Self {
            configuration,
            executor,
            auto_commit,
            dirty: false,
            closed: false,
            cursors: Vec::new(),
        }
    }

    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.closed {
            Err(SqlMapperError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn resolve(&self, statement_id: &str) -> Result<Arc<MappedStatement>, SqlMapperError> {
        self.ensure_open()?;
        self.configuration.statement(statement_id)
    }

    fn commit_or_rollback_required(&self, force: bool) -> bool {
        (!self.auto_commit && self.dirty) || force
    }

    /// At most one result.
    ///
    /// # Errors
    /// Returns `SqlMapperError::TooManyResults` when the query yields more than one row.
    pub async fn select_one(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<Option<Object>, SqlMapperError> {
        let statement = self.resolve(statement_id)?;
        self.select_one_statement(&statement, &parameter.into())
            .await
    }

    /// [`select_one`](Self::select_one) converted to `T`.
    ///
    /// # Errors
    /// See [`select_one`](Self::select_one); also the conversion error.
    pub async fn select_one_as<T: FromObject>(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<Option<T>, SqlMapperError> {
        self.select_one(statement_id, parameter)
            .await?
            .map(T::from_object)
            .transpose()
    }

    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn select_list(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<Vec<Object>, SqlMapperError> {
        self.select_list_with_bounds(statement_id, parameter, RowBounds::default())
            .await
    }

    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn select_list_with_bounds(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
        bounds: RowBounds,
    ) -> Result<Vec<Object>, SqlMapperError> {
        let statement = self.resolve(statement_id)?;
        self.select_statement(&statement, &parameter.into(), bounds)
            .await
    }

    /// [`select_list`](Self::select_list) converted to `T`.
    ///
    /// # Errors
    /// See [`select_list`](Self::select_list); also the conversion error.
    pub async fn select_list_as<T: FromObject>(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<Vec<T>, SqlMapperError> {
        self.select_list(statement_id, parameter)
            .await?
            .into_iter()
            .map(T::from_object)
            .collect()
    }

    /// Results keyed by the value of property `key` of each result.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` when a result has no such property.
    pub async fn select_map(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
        key: &str,
    ) -> Result<HashMap<ObjectKey, Object>, SqlMapperError> {
        let statement = self.resolve(statement_id)?;
        self.select_map_statement(&statement, &parameter.into(), key, RowBounds::default())
            .await
    }

    /// Lazily mapped results. The cursor is closed at the latest when this session closes.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn select_cursor(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<Cursor, SqlMapperError> {
        self.select_cursor_with_bounds(statement_id, parameter, RowBounds::default())
            .await
    }

    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn select_cursor_with_bounds(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
        bounds: RowBounds,
    ) -> Result<Cursor, SqlMapperError> {
        let statement = self.resolve(statement_id)?;
        self.cursor_statement(&statement, &parameter.into(), bounds)
            .await
    }

    /// Stream results into `handler` until it breaks or the rows run out; returns the number
    /// of results handled.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn select_with_handler(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
        bounds: RowBounds,
        handler: &mut dyn ResultHandler,
    ) -> Result<usize, SqlMapperError> {
        let mut cursor = self
            .select_cursor_with_bounds(statement_id, parameter, bounds)
            .await?;
        let mut handled = 0;
        while let Some(result) = cursor.fetch_next().await? {
            let flow = handler.handle_result(result, handled);
            handled += 1;
            if flow.is_break() {
                cursor.close().await?;
                break;
            }
        }
        Ok(handled)
    }

    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn insert(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<u64, SqlMapperError> {
        self.update(statement_id, parameter).await
    }

    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn update(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<u64, SqlMapperError> {
        let statement = self.resolve(statement_id)?;
        self.update_statement(&statement, &parameter.into()).await
    }

    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn delete(
        &mut self,
        statement_id: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<u64, SqlMapperError> {
        self.update(statement_id, parameter).await
    }

    /// Commit if anything was written.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.commit_with(false).await
    }

    /// Commit; `force` commits even when nothing was written.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn commit_with(&mut self, force: bool) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        let required = self.commit_or_rollback_required(force);
        self.executor.commit(required).await?;
        self.dirty = false;
        Ok(())
    }

    /// Roll back if anything was written.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.rollback_with(false).await
    }

    /// Roll back; `force` rolls back even when nothing was written.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or the executor's error.
    pub async fn rollback_with(&mut self, force: bool) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        let required = self.commit_or_rollback_required(force);
        self.executor.rollback(required).await?;
        self.dirty = false;
        Ok(())
    }

    /// Send queued batch work to the driver.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Batch` when a queued statement fails.
    pub async fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.ensure_open()?;
        self.executor.flush_statements(false).await
    }

    /// Drop the session-local query cache.
    pub fn clear_cache(&mut self) {
        self.executor.clear_local_cache();
    }

    /// Close every cursor, roll back uncommitted writes and release the connection.
    ///
    /// Closing an already closed session does nothing.
    ///
    /// # Errors
    /// Returns the executor's error.
    pub async fn close(&mut self) -> Result<(), SqlMapperError> {
        if self.closed {
            return Ok(());
        }
        for cursor in self.cursors.drain(..) {
            close_registered(&cursor).await;
        }
        let force_rollback = self.commit_or_rollback_required(false);
        let result = self.executor.close(force_rollback).await;
        self.closed = true;
        self.dirty = false;
        debug!(force_rollback, "closed session");
        result
    }

    /// Bind the contract registered under `namespace` to this session.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` after close, or `ConfigError` for an unknown
    /// namespace.
    pub fn get_mapper(&mut self, namespace: &str) -> Result<MapperProxy<'_>, SqlMapperError> {
        self.ensure_open()?;
        let table = self.configuration.mappers().dispatch_table(namespace)?;
        Ok(MapperProxy::new(self, table))
    }

    pub(crate) async fn select_statement(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Vec<Object>, SqlMapperError> {
        self.ensure_open()?;
        self.executor.query(statement, parameter, bounds).await
    }

    pub(crate) async fn select_one_statement(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
    ) -> Result<Option<Object>, SqlMapperError> {
        let mut list = self
            .select_statement(statement, parameter, RowBounds::default())
            .await?;
        match list.len() {
            0 | 1 => Ok(list.pop()),
            found => Err(SqlMapperError::TooManyResults(found)),
        }
    }

    pub(crate) async fn select_map_statement(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        key: &str,
        bounds: RowBounds,
    ) -> Result<HashMap<ObjectKey, Object>, SqlMapperError> {
        let list = self.select_statement(statement, parameter, bounds).await?;
        let mut map = HashMap::with_capacity(list.len());
        for object in list {
            let value = object.property(key).ok_or_else(|| {
                SqlMapperError::ParameterError(format!(
                    "There is no property named '{key}' in the results of '{}'",
                    statement.id()
                ))
            })?;
            map.insert(ObjectKey::from(value), object);
        }
        Ok(map)
    }

    pub(crate) async fn cursor_statement(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Cursor, SqlMapperError> {
        self.ensure_open()?;
        let cursor = self
            .executor
            .query_cursor(statement, parameter, bounds)
            .await?;
        self.cursors.retain(|registered| registered.strong_count() > 0);
        self.cursors.push(cursor.downgrade());
        Ok(cursor)
    }

    pub(crate) async fn update_statement(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
    ) -> Result<u64, SqlMapperError> {
        self.ensure_open()?;
        self.dirty = true;
        self.executor.update(statement, parameter).await
    }
}

impl fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlSession")
            .field("auto_commit", &self.auto_commit)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .field("open_cursors", &self.cursors.len())
            .finish_non_exhaustive()
    }
}
