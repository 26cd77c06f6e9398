use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{Connection, Handle};
use crate::error::{BatchResult, SqlMapperError};
use crate::executor::{Cursor, Executor, StatementHandler};
use crate::mapping::{MappedStatement, Parameter};
use crate::reflection::Object;
use crate::types::RowBounds;

use super::signature::{Capability, Operation, Signature};

/// Cross-cutting handler invoked around the operations named by its signatures.
///
/// Implementations reach the next layer, and finally the component, through
/// [`Invocation::proceed`]. Not calling it short-circuits the operation.
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn signatures(&self) -> Vec<Signature>;

    async fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, SqlMapperError>;
}

/// The component an invocation proceeds to.
pub enum Target<'a> {
    Executor(&'a mut dyn Executor),
    StatementHandler(&'a mut dyn StatementHandler),
}

/// Arguments of an intercepted operation.
pub enum Args<'a> {
    Update {
        statement: &'a Arc<MappedStatement>,
        parameter: &'a Parameter,
    },
    Query {
        statement: &'a Arc<MappedStatement>,
        parameter: &'a Parameter,
        bounds: RowBounds,
    },
    Flag(bool),
    Prepare {
        connection: &'a mut dyn Connection,
        timeout: Option<Duration>,
    },
    Handle(&'a mut dyn Handle),
    OwnedHandle(Box<dyn Handle>),
}

impl fmt::Debug for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Args::Update { statement, .. } => {
                f.debug_struct("Update").field("statement", &statement.id()).finish()
            }
            Args::Query {
                statement, bounds, ..
            } => f
                .debug_struct("Query")
                .field("statement", &statement.id())
                .field("bounds", bounds)
                .finish(),
            Args::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            Args::Prepare { timeout, .. } => {
                f.debug_struct("Prepare").field("timeout", timeout).finish()
            }
            Args::Handle(handle) => f.debug_tuple("Handle").field(&handle.sql()).finish(),
            Args::OwnedHandle(handle) => {
                f.debug_tuple("OwnedHandle").field(&handle.sql()).finish()
            }
        }
    }
}

/// Result of an intercepted operation.
pub enum Outcome {
    Count(u64),
    Objects(Vec<Object>),
    Cursor(Cursor),
    BatchResults(Vec<BatchResult>),
    Handle(Box<dyn Handle>),
    Unit,
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Count(count) => f.debug_tuple("Count").field(count).finish(),
            Outcome::Objects(objects) => f.debug_tuple("Objects").field(objects).finish(),
            Outcome::Cursor(_) => f.write_str("Cursor"),
            Outcome::BatchResults(results) => {
                f.debug_tuple("BatchResults").field(results).finish()
            }
            Outcome::Handle(handle) => f.debug_tuple("Handle").field(&handle.sql()).finish(),
            Outcome::Unit => f.write_str("Unit"),
        }
    }
}

fn mismatch(expected: &str, found: &Outcome) -> SqlMapperError {
    SqlMapperError::Other(format!(
        "interceptor returned {found:?} where {expected} was expected"
    ))
}

impl Outcome {
    /// # Errors
    /// Returns `SqlMapperError::Other` when the outcome is of another kind.
    pub fn into_count(self) -> Result<u64, SqlMapperError> {
        match self {
            Outcome::Count(count) => Ok(count),
            other => Err(mismatch("a count", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` when the outcome is of another kind.
    pub fn into_objects(self) -> Result<Vec<Object>, SqlMapperError> {
        match self {
            Outcome::Objects(objects) => Ok(objects),
            other => Err(mismatch("a result list", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` when the outcome is of another kind.
    pub fn into_cursor(self) -> Result<Cursor, SqlMapperError> {
        match self {
            Outcome::Cursor(cursor) => Ok(cursor),
            other => Err(mismatch("a cursor", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` when the outcome is of another kind.
    pub fn into_batch_results(self) -> Result<Vec<BatchResult>, SqlMapperError> {
        match self {
            Outcome::BatchResults(results) => Ok(results),
            other => Err(mismatch("batch results", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` when the outcome is of another kind.
    pub fn into_handle(self) -> Result<Box<dyn Handle>, SqlMapperError> {
        match self {
            Outcome::Handle(handle) => Ok(handle),
            other => Err(mismatch("a statement handle", &other)),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::Other` when the outcome is of another kind.
    pub fn into_unit(self) -> Result<(), SqlMapperError> {
        match self {
            Outcome::Unit => Ok(()),
            other => Err(mismatch("no value", &other)),
        }
    }
}

/// One call travelling through the interceptor chain.
pub struct Invocation<'a> {
    target: Target<'a>,
    operation: Operation,
    args: Args<'a>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(target: Target<'a>, operation: Operation, args: Args<'a>) -> Self {
        Self {
            target,
            operation,
            args,
        }
    }

    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    #[must_use]
    pub fn capability(&self) -> Capability {
        self.operation.capability
    }

    #[must_use]
    pub fn args(&self) -> &Args<'a> {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Args<'a> {
        &mut self.args
    }

    /// The statement this call works on, from the arguments or the statement handler.
    #[must_use]
    pub fn statement(&self) -> Option<&MappedStatement> {
        match (&self.args, &self.target) {
            (Args::Update { statement, .. } | Args::Query { statement, .. }, _) => {
                Some(statement.as_ref())
            }
            (_, Target::StatementHandler(handler)) => Some(handler.statement().as_ref()),
            _ => None,
        }
    }

    /// Row bounds of a query, open for rewriting before [`proceed`](Self::proceed).
    pub fn bounds_mut(&mut self) -> Option<&mut RowBounds> {
        match &mut self.args {
            Args::Query { bounds, .. } => Some(bounds),
            _ => None,
        }
    }

    /// Timeout of a prepare, open for rewriting before [`proceed`](Self::proceed).
    pub fn timeout_mut(&mut self) -> Option<&mut Option<Duration>> {
        match &mut self.args {
            Args::Prepare { timeout, .. } => Some(timeout),
            _ => None,
        }
    }

    /// Run the operation on the next layer.
    ///
    /// # Errors
    /// Returns whatever the next layer returns, or `SqlMapperError::Other` when the arguments
    /// were rewritten into a shape the operation does not take.
    pub async fn proceed(self) -> Result<Outcome, SqlMapperError> {
        let name = self.operation.name;
        match (self.target, self.args) {
            (Target::Executor(executor), Args::Update { statement, parameter }) => {
                executor.update(statement, parameter).await.map(Outcome::Count)
            }
            (
                Target::Executor(executor),
                Args::Query {
                    statement,
                    parameter,
                    bounds,
                },
            ) => {
                if name == "query_cursor" {
                    executor
                        .query_cursor(statement, parameter, bounds)
                        .await
                        .map(Outcome::Cursor)
                } else {
                    executor
                        .query(statement, parameter, bounds)
                        .await
                        .map(Outcome::Objects)
                }
            }
            (Target::Executor(executor), Args::Flag(flag)) => match name {
                "flush_statements" => executor
                    .flush_statements(flag)
                    .await
                    .map(Outcome::BatchResults),
                "commit" => executor.commit(flag).await.map(|()| Outcome::Unit),
                "rollback" => executor.rollback(flag).await.map(|()| Outcome::Unit),
                _ => executor.close(flag).await.map(|()| Outcome::Unit),
            },
            (Target::StatementHandler(handler), Args::Prepare { connection, timeout }) => handler
                .prepare(connection, timeout)
                .await
                .map(Outcome::Handle),
            (Target::StatementHandler(handler), Args::Handle(handle)) => match name {
                "parameterize" => handler.parameterize(handle).await.map(|()| Outcome::Unit),
                "update" => handler.update(handle).await.map(Outcome::Count),
                "query" => handler.query(handle).await.map(Outcome::Objects),
                _ => handler.batch(handle).await.map(|()| Outcome::Unit),
            },
            (Target::StatementHandler(handler), Args::OwnedHandle(handle)) => {
                handler.query_cursor(handle).await.map(Outcome::Cursor)
            }
            (_, args) => Err(SqlMapperError::Other(format!(
                "arguments {args:?} do not fit operation {}",
                self.operation
            ))),
        }
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("operation", &self.operation)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
