//! Statement mapper: named data-access operations bound to precompiled SQL statements,
//! executed through pluggable executors and interceptors, with results materialized into
//! runtime-built objects.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sql_mapper::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlMapperError> {
//! let data_source = SqliteOptionsBuilder::new("app.db".into()).build().await?;
//! let configuration = Configuration::builder()
//!     .environment(Environment::new("dev", Arc::new(data_source)))
//!     .statement(
//!         MappedStatement::builder(
//!             "users.count",
//!             SqlCommandType::Select,
//!             "SELECT count(*) FROM users",
//!         )
//!         .result(ResultShape::scalar(ScalarKind::Int))
//!         .build()?,
//!     )
//!     .build()?;
//!
//! let factory = SqlSessionFactory::new(configuration);
//! let mut session = factory.open_session().await?;
//! let count: Option<i64> = session.select_one_as("users.count", ()).await?;
//! session.close().await?;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod cache;
pub mod driver;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod plugin;
pub mod prelude;
pub mod reflection;
pub mod results;
pub mod session;
pub mod transaction;
pub mod translation;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::SqlMapperError;
pub use types::{ExecutorType, IsolationLevel, RowBounds, RowValues, ScalarKind, SqlCommandType};
