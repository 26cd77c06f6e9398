use std::sync::Arc;
use std::time::Duration;

use crate::error::SqlMapperError;
use crate::translation::{ParsedSql, parse_parameter_markers};
use crate::types::{RowValues, SqlCommandType};

use super::bound_sql::BoundSql;
use super::parameter::Parameter;
use super::result_shape::ResultShape;

/// Compiled, immutable form of one mapped operation.
///
/// The SQL template is parsed once when the statement is built; every call only resolves
/// parameter values into a fresh [`BoundSql`].
#[derive(Debug, Clone)]
pub struct MappedStatement {
    id: String,
    command_type: SqlCommandType,
    template: String,
    parsed: ParsedSql,
    result_shape: Arc<ResultShape>,
    use_cache: bool,
    flush_cache: bool,
    cache_namespace: Option<String>,
    timeout: Option<Duration>,
}

impl MappedStatement {
    /// Start building a statement with the qualified id `namespace.operation`.
    #[must_use]
    pub fn builder(
        id: impl Into<String>,
        command_type: SqlCommandType,
        template: impl Into<String>,
    ) -> MappedStatementBuilder {
        MappedStatementBuilder::new(id.into(), command_type, template.into())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Part of the id before the last `.`, empty for unqualified ids.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.id.rsplit_once('.').map_or("", |(ns, _)| ns)
    }

    #[must_use]
    pub fn command_type(&self) -> SqlCommandType {
        self.command_type
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn result_shape(&self) -> &Arc<ResultShape> {
        &self.result_shape
    }

    #[must_use]
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    #[must_use]
    pub fn flush_cache(&self) -> bool {
        self.flush_cache
    }

    #[must_use]
    pub fn cache_namespace(&self) -> Option<&str> {
        self.cache_namespace.as_deref()
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve the parameter object against the template's markers.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` when a marker cannot be resolved or its value
    /// cannot be converted to the declared kind.
    pub fn bound_sql(&self, parameter: &Parameter) -> Result<BoundSql, SqlMapperError> {
        let values = self
            .parsed
            .parameter_mappings
            .iter()
            .map(|mapping| {
                let value = parameter.resolve(&mapping.property)?;
                match mapping.kind {
                    Some(kind) => value.coerce(kind),
                    None => Ok(value),
                }
            })
            .collect::<Result<Vec<RowValues>, SqlMapperError>>()?;
        Ok(BoundSql::new(
            self.parsed.sql.clone(),
            self.parsed.parameter_mappings.clone(),
            values,
        ))
    }
}

/// Fluent builder for [`MappedStatement`].
#[derive(Debug, Clone)]
pub struct MappedStatementBuilder {
    id: String,
    command_type: SqlCommandType,
    template: String,
    result_shape: ResultShape,
    use_cache: bool,
    flush_cache: bool,
    cache_namespace: Option<String>,
    timeout: Option<Duration>,
}

impl MappedStatementBuilder {
    fn new(id: String, command_type: SqlCommandType, template: String) -> Self {
        let is_select = command_type == SqlCommandType::Select;
        Self {
            id,
            command_type,
            template,
            result_shape: ResultShape::default(),
            use_cache: is_select,
            flush_cache: !is_select,
            cache_namespace: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn result(mut self, shape: ResultShape) -> Self {
        self.result_shape = shape;
        self
    }

    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    #[must_use]
    pub fn flush_cache(mut self, flush_cache: bool) -> Self {
        self.flush_cache = flush_cache;
        self
    }

    #[must_use]
    pub fn cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parse the template and freeze the statement.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for an empty id or a malformed template.
    pub fn build(self) -> Result<MappedStatement, SqlMapperError> {
        if self.id.trim().is_empty() {
            return Err(SqlMapperError::ConfigError(
                "statement id must not be empty".into(),
            ));
        }
        let parsed = parse_parameter_markers(&self.template).map_err(|e| match e {
            SqlMapperError::ConfigError(msg) => {
                SqlMapperError::ConfigError(format!("statement '{}': {msg}", self.id))
            }
            other => other,
        })?;
        Ok(MappedStatement {
            id: self.id,
            command_type: self.command_type,
            template: self.template,
            parsed,
            result_shape: Arc::new(self.result_shape),
            use_cache: self.use_cache,
            flush_cache: self.flush_cache,
            cache_namespace: self.cache_namespace,
            timeout: self.timeout,
        })
    }
}
