//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::binding::{Arg, Contract, MapperProxy, OperationDecl, ReturnShape, ReturnValue};
pub use crate::cache::{Cache, LruCache, PerpetualCache};
pub use crate::driver::{Connection, DataSource, Handle};
pub use crate::error::{
    BatchExecutionError, BatchResult, ExecutionError, ReflectionError, SqlMapperError,
};
pub use crate::executor::{Cursor, Executor, StatementHandler};
pub use crate::mapping::{MappedStatement, Parameter, ResultShape};
pub use crate::plugin::{
    Args, Capability, Interceptor, Invocation, Outcome, ParamType, Signature, executor_ops,
    statement_handler_ops,
};
pub use crate::reflection::{
    Bean, Constructor, DefaultObjectFactory, FromObject, Object, ObjectFactory, ObjectKey,
    TypeKey,
};
pub use crate::results::CustomDbRow;
pub use crate::session::{
    Configuration, ConfigurationBuilder, Environment, LocalCacheScope, Settings, SqlSession,
    SqlSessionFactory,
};
pub use crate::transaction::{DriverTransactionFactory, ManagedTransactionFactory};
pub use crate::types::{
    ExecutorType, IsolationLevel, RowBounds, RowValues, ScalarKind, SqlCommandType,
};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDataSource, SqliteOptions, SqliteOptionsBuilder};
