//! Statement descriptors and the values they are bound with.

pub mod bound_sql;
pub mod parameter;
pub mod registry;
pub mod result_shape;
pub mod statement;

pub use bound_sql::BoundSql;
pub use parameter::Parameter;
pub use registry::StatementRegistry;
pub use result_shape::{ConstructorArg, ResultMapping, ResultShape};
pub use statement::{MappedStatement, MappedStatementBuilder};
