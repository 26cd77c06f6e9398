use crate::translation::ParameterMapping;
use crate::types::RowValues;

/// Driver-ready SQL for one call: placeholders, the mappings they came from, and the values
/// resolved from the caller's parameter object.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub parameter_mappings: Vec<ParameterMapping>,
    pub parameter_values: Vec<RowValues>,
}

impl BoundSql {
    #[must_use]
    pub fn new(
        sql: impl Into<String>,
        parameter_mappings: Vec<ParameterMapping>,
        parameter_values: Vec<RowValues>,
    ) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings,
            parameter_values,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn parameter_values(&self) -> &[RowValues] {
        &self.parameter_values
    }
}
