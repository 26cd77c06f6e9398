use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{BatchResult, SqlMapperError};
use crate::executor::Cursor;
use crate::reflection::{FromObject, Object, ObjectKey};
use crate::session::SqlSession;
use crate::types::SqlCommandType;

use super::contract::{Arg, ReturnShape};
use super::registry::{DispatchTable, MapperMethod, MethodInvoker};

/// What a mapper operation returned.
#[derive(Debug)]
pub enum ReturnValue {
    One(Option<Object>),
    Many(Vec<Object>),
    Map(HashMap<ObjectKey, Object>),
    Cursor(Cursor),
    RowCount(u64),
    Flag(bool),
    Unit,
    BatchResults(Vec<BatchResult>),
}

fn unexpected(expected: &str, found: &ReturnValue) -> SqlMapperError {
    SqlMapperError::Other(format!("expected {expected}, the operation returned {found:?}"))
}

impl ReturnValue {
    /// The single result converted to `T`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Other` for another return shape, or the conversion error.
    pub fn into_one<T: FromObject>(self) -> Result<Option<T>, SqlMapperError> {
        match self {
            ReturnValue::One(found) => found.map(T::from_object).transpose(),
            other => Err(unexpected("a single result", &other)),
        }
    }

    /// Every result converted to `T`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Other` for another return shape, or the conversion error.
    pub fn into_many<T: FromObject>(self) -> Result<Vec<T>, SqlMapperError> {
        match self {
            ReturnValue::Many(list) => list.into_iter().map(T::from_object).collect(),
            other => Err(unexpected("a result list", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` for another return shape.
    pub fn into_map(self) -> Result<HashMap<ObjectKey, Object>, SqlMapperError> {
        match self {
            ReturnValue::Map(map) => Ok(map),
            other => Err(unexpected("a keyed result map", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` for another return shape.
    pub fn into_cursor(self) -> Result<Cursor, SqlMapperError> {
        match self {
            ReturnValue::Cursor(cursor) => Ok(cursor),
            other => Err(unexpected("a cursor", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` for another return shape.
    pub fn row_count(&self) -> Result<u64, SqlMapperError> {
        match self {
            ReturnValue::RowCount(count) => Ok(*count),
            other => Err(unexpected("a row count", other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` for another return shape.
    pub fn flag(&self) -> Result<bool, SqlMapperError> {
        match self {
            ReturnValue::Flag(flag) => Ok(*flag),
            other => Err(unexpected("a flag", other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` for another return shape.
    pub fn into_batch_results(self) -> Result<Vec<BatchResult>, SqlMapperError> {
        match self {
            ReturnValue::BatchResults(results) => Ok(results),
            other => Err(unexpected("batch results", &other)),
        }
    }
}

impl MapperMethod {
    fn unsupported(&self, command: SqlCommandType) -> SqlMapperError {
        SqlMapperError::ConfigError(format!(
            "Mapper method '{}' cannot return {:?} for a {command:?} statement",
            self.name, self.returns
        ))
    }

    pub(crate) async fn execute(
        &self,
        session: &mut SqlSession,
        args: Vec<Arg>,
    ) -> Result<ReturnValue, SqlMapperError> {
        if self.returns == ReturnShape::BatchResults {
            return session.flush_statements().await.map(ReturnValue::BatchResults);
        }
        let Some(statement) = &self.statement else {
            return Err(SqlMapperError::ConfigError(format!(
                "Invalid bound statement (not found): {}",
                self.name
            )));
        };
        let (parameter, bounds) = self.params.resolve(args);
        let command = statement.command_type();
        match command {
            SqlCommandType::Select => match &self.returns {
                ReturnShape::One => session
                    .select_one_statement(statement, &parameter)
                    .await
                    .map(ReturnValue::One),
                ReturnShape::Many => session
                    .select_statement(statement, &parameter, bounds)
                    .await
                    .map(ReturnValue::Many),
                ReturnShape::Map { key } => session
                    .select_map_statement(statement, &parameter, key, bounds)
                    .await
                    .map(ReturnValue::Map),
                ReturnShape::Cursor => session
                    .cursor_statement(statement, &parameter, bounds)
                    .await
                    .map(ReturnValue::Cursor),
                _ => Err(self.unsupported(command)),
            },
            SqlCommandType::Insert | SqlCommandType::Update | SqlCommandType::Delete => {
                let count = session.update_statement(statement, &parameter).await?;
                match &self.returns {
                    ReturnShape::RowCount => Ok(ReturnValue::RowCount(count)),
                    ReturnShape::Flag => Ok(ReturnValue::Flag(count > 0)),
                    ReturnShape::Unit => Ok(ReturnValue::Unit),
                    _ => Err(self.unsupported(command)),
                }
            }
            SqlCommandType::Flush => Err(self.unsupported(command)),
        }
    }
}

/// A contract bound to an open session.
///
/// ```rust,no_run
/// # use sql_mapper::prelude::*;
/// # async fn demo(session: &mut SqlSession) -> Result<(), SqlMapperError> {
/// let mut users = session.get_mapper("UserMapper")?;
/// let name: Option<Object> = users.invoke("findById", vec![Arg::from(42_i64)]).await?.into_one()?;
/// # let _ = name;
/// # Ok(())
/// # }
/// ```
pub struct MapperProxy<'s> {
    session: &'s mut SqlSession,
    table: Arc<DispatchTable>,
}

impl<'s> MapperProxy<'s> {
    pub(crate) fn new(session: &'s mut SqlSession, table: Arc<DispatchTable>) -> Self {
        Self { session, table }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.table.contract().namespace()
    }

    /// Invoke `operation` with `args`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SessionClosed` once the session is closed,
    /// `SqlMapperError::ConfigError` for an unknown operation or statement, or the error of the
    /// underlying session call.
    pub async fn invoke(
        &mut self,
        operation: &str,
        args: Vec<Arg>,
    ) -> Result<ReturnValue, SqlMapperError> {
        if self.session.is_closed() {
            return Err(SqlMapperError::SessionClosed);
        }
        let invoker = self
            .table
            .invoker(operation, self.session.configuration().statements())?;
        debug!(mapper = self.namespace(), operation, "invoking mapper operation");
        match invoker.as_ref() {
            MethodInvoker::Default(body) => (**body)(&mut *self.session, args).await,
            MethodInvoker::Mapped(method) => method.execute(self.session, args).await,
        }
    }

    /// The session this proxy runs on.
    pub fn session(&mut self) -> &mut SqlSession {
        self.session
    }
}
