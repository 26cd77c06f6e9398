use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SqlMapperError;

use super::statement::MappedStatement;

/// Statements keyed by qualified id.
///
/// The part after the last `.` also resolves as long as only one namespace uses it.
#[derive(Debug, Default, Clone)]
pub struct StatementRegistry {
    statements: HashMap<String, Arc<MappedStatement>>,
    // short name -> qualified id, `None` once two namespaces claim it
    short_names: HashMap<String, Option<String>>,
}

impl StatementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when the id is already taken.
    pub fn add(&mut self, statement: MappedStatement) -> Result<(), SqlMapperError> {
        let id = statement.id().to_string();
        if self.statements.contains_key(&id) {
            return Err(SqlMapperError::ConfigError(format!(
                "Mapped statements collection already contains value for {id}"
            )));
        }
        if let Some((_, short)) = id.rsplit_once('.') {
            self.short_names
                .entry(short.to_string())
                .and_modify(|existing| *existing = None)
                .or_insert_with(|| Some(id.clone()));
        }
        self.statements.insert(id, Arc::new(statement));
        Ok(())
    }

    /// Look a statement up by qualified or short id.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for an unknown or ambiguous id.
    pub fn get(&self, id: &str) -> Result<Arc<MappedStatement>, SqlMapperError> {
        if let Some(statement) = self.statements.get(id) {
            return Ok(Arc::clone(statement));
        }
        match self.short_names.get(id) {
            Some(Some(qualified)) => self.statements.get(qualified).cloned().ok_or_else(|| {
                SqlMapperError::ConfigError(format!(
                    "Mapped statements collection does not contain value for {id}"
                ))
            }),
            Some(None) => Err(SqlMapperError::ConfigError(format!(
                "{id} is ambiguous in Mapped Statements collection (try using the full name including the namespace)"
            ))),
            None => Err(SqlMapperError::ConfigError(format!(
                "Mapped statements collection does not contain value for {id}"
            ))),
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MappedStatement>> {
        self.statements.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
