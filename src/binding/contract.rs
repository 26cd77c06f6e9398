use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::SqlMapperError;
use crate::mapping::Parameter;
use crate::reflection::Bean;
use crate::session::SqlSession;
use crate::types::{RowBounds, RowValues};

use super::proxy::ReturnValue;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Body of an operation implemented in code rather than by a mapped statement.
pub type DefaultBody = Arc<
    dyn for<'s> Fn(&'s mut SqlSession, Vec<Arg>) -> BoxFuture<'s, Result<ReturnValue, SqlMapperError>>
        + Send
        + Sync,
>;

/// What an operation hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    /// At most one row.
    One,
    Many,
    /// Rows keyed by the value of property `key`.
    Map { key: String },
    Cursor,
    /// Affected row count of a write.
    RowCount,
    /// Whether a write affected any row.
    Flag,
    Unit,
    /// Results of flushing queued batch work; needs no statement.
    BatchResults,
}

/// One argument passed to a mapper operation.
pub enum Arg {
    Param(Parameter),
    Bounds(RowBounds),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Param(param) => f.debug_tuple("Param").field(param).finish(),
            Arg::Bounds(bounds) => f.debug_tuple("Bounds").field(bounds).finish(),
        }
    }
}

impl From<Parameter> for Arg {
    fn from(value: Parameter) -> Self {
        Arg::Param(value)
    }
}

impl From<RowBounds> for Arg {
    fn from(value: RowBounds) -> Self {
        Arg::Bounds(value)
    }
}

impl From<RowValues> for Arg {
    fn from(value: RowValues) -> Self {
        Arg::Param(Parameter::Value(value))
    }
}

impl From<Box<dyn Bean>> for Arg {
    fn from(value: Box<dyn Bean>) -> Self {
        Arg::Param(Parameter::Bean(value))
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Param(value.into())
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Param(value.into())
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Param(value.into())
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Param(value.into())
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Param(value.into())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Param(value.into())
    }
}

/// Declaration of one named operation of a contract.
#[derive(Clone)]
pub struct OperationDecl {
    name: String,
    param_names: Vec<Option<String>>,
    returns: ReturnShape,
    default_body: Option<DefaultBody>,
}

impl OperationDecl {
    #[must_use]
    pub fn new(name: impl Into<String>, returns: ReturnShape) -> Self {
        Self {
            name: name.into(),
            param_names: Vec::new(),
            returns,
            default_body: None,
        }
    }

    /// Declare the next positional parameter under `name`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.param_names.push(Some(name.into()));
        self
    }

    /// Declare the next positional parameter without a name.
    #[must_use]
    pub fn unnamed_param(mut self) -> Self {
        self.param_names.push(None);
        self
    }

    /// Implement the operation in code; it runs with the session and skips statement lookup.
    #[must_use]
    pub fn default_body<F>(mut self, body: F) -> Self
    where
        F: for<'s> Fn(&'s mut SqlSession, Vec<Arg>) -> BoxFuture<'s, Result<ReturnValue, SqlMapperError>>
            + Send
            + Sync
            + 'static,
    {
        self.default_body = Some(Arc::new(body));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn param_names(&self) -> &[Option<String>] {
        &self.param_names
    }

    #[must_use]
    pub fn returns(&self) -> &ReturnShape {
        &self.returns
    }

    #[must_use]
    pub fn body(&self) -> Option<&DefaultBody> {
        self.default_body.as_ref()
    }
}

impl fmt::Debug for OperationDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDecl")
            .field("name", &self.name)
            .field("param_names", &self.param_names)
            .field("returns", &self.returns)
            .field("default_body", &self.default_body.is_some())
            .finish()
    }
}

/// A named set of data-access operations, each bound to the statement `namespace.operation`.
///
/// ```rust
/// use sql_mapper::binding::{Contract, OperationDecl, ReturnShape};
///
/// let contract = Contract::new("UserMapper")
///     .operation(OperationDecl::new("findById", ReturnShape::One).param("id"))
///     .operation(OperationDecl::new("insert", ReturnShape::RowCount).unnamed_param());
/// assert_eq!(contract.operations().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Contract {
    namespace: String,
    operations: Vec<OperationDecl>,
}

impl Contract {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn operation(mut self, operation: OperationDecl) -> Self {
        self.operations.push(operation);
        self
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn operations(&self) -> &[OperationDecl] {
        &self.operations
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&OperationDecl> {
        self.operations.iter().find(|op| op.name == name)
    }
}
