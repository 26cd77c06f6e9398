use std::fmt;

use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;

use crate::types::RowValues;

#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Reflection(#[from] ReflectionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Batch(#[from] BatchExecutionError),

    #[error("Resource closed: {0}")]
    ResourceClosed(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error(
        "Expected one result (or none) to be returned by select_one(), but found: {0}"
    )]
    TooManyResults(usize),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Error opening session: {0}")]
    OpenSession(#[source] Box<SqlMapperError>),

    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl SqlMapperError {
    /// Attach statement context to an error raised by the driver.
    ///
    /// Errors that already carry context, or that describe the state of this crate's own
    /// resources, are returned untouched.
    #[must_use]
    pub fn in_statement(self, statement_id: &str, sql: &str, parameters: &[RowValues]) -> Self {
        match self {
            SqlMapperError::Execution(_)
            | SqlMapperError::Batch(_)
            | SqlMapperError::ResourceClosed(_)
            | SqlMapperError::SessionClosed
            | SqlMapperError::ConfigError(_)
            | SqlMapperError::ParameterError(_)
            | SqlMapperError::Reflection(_) => self,
            other => SqlMapperError::Execution(ExecutionError {
                statement_id: statement_id.to_string(),
                sql: sql.to_string(),
                parameters: parameters.to_vec(),
                source: Box::new(other),
            }),
        }
    }

    #[must_use]
    pub fn open_session(cause: SqlMapperError) -> Self {
        SqlMapperError::OpenSession(Box::new(cause))
    }
}

/// A driver failure tagged with the statement that triggered it.
#[derive(Debug, Error)]
#[error(
    "Error executing statement '{statement_id}' ({sql}) with parameters {parameters:?}: {source}"
)]
pub struct ExecutionError {
    pub statement_id: String,
    pub sql: String,
    pub parameters: Vec<RowValues>,
    #[source]
    pub source: Box<SqlMapperError>,
}

/// Instantiation failure reported by the object factory.
#[derive(Debug, Clone, Error)]
pub struct ReflectionError {
    pub type_name: String,
    pub arg_types: Vec<String>,
    pub arg_values: Vec<String>,
    pub cause: String,
}

impl ReflectionError {
    #[must_use]
    pub fn new(type_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            arg_types: Vec::new(),
            arg_values: Vec::new(),
            cause: cause.into(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, arg_types: Vec<String>, arg_values: Vec<String>) -> Self {
        self.arg_types = arg_types;
        self.arg_values = arg_values;
        self
    }
}

impl fmt::Display for ReflectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error instantiating {} with invalid types ({}) or values ({}). Cause: {}",
            self.type_name,
            self.arg_types.join(","),
            self.arg_values.join(","),
            self.cause
        )
    }
}

/// Outcome of one flushed batch statement: the SQL, every parameter set that was queued for it,
/// and the per-parameter-set update counts reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub statement_id: String,
    pub sql: String,
    pub parameter_sets: Vec<Vec<RowValues>>,
    pub update_counts: Vec<u64>,
}

impl BatchResult {
    #[must_use]
    pub fn new(statement_id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            statement_id: statement_id.into(),
            sql: sql.into(),
            parameter_sets: Vec::new(),
            update_counts: Vec::new(),
        }
    }

    /// Sum of the update counts of every parameter set.
    #[must_use]
    pub fn total_updates(&self) -> u64 {
        self.update_counts.iter().sum()
    }
}

/// Raised when a batch flush stops at a failing statement.
///
/// `successful` holds the results of every statement executed before the failure. Statements
/// queued after `failed` were discarded without reaching the driver.
#[derive(Debug, Error)]
#[error(
    "Batch failed at statement '{}' after {} successful statement(s): {source}",
    .failed.statement_id,
    .successful.len()
)]
pub struct BatchExecutionError {
    pub successful: Vec<BatchResult>,
    pub failed: BatchResult,
    pub discarded: usize,
    #[source]
    pub source: Box<SqlMapperError>,
}
