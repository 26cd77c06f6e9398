use std::time::Duration;

use serde::Deserialize;

use crate::error::SqlMapperError;
use crate::types::ExecutorType;

/// How long session-local query results are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalCacheScope {
    /// Until the next write, commit, rollback or close of the session.
    #[default]
    Session,
    /// Only while a single query runs.
    Statement,
}

/// Global behaviour switches of a [`Configuration`](super::Configuration).
///
/// Every field is optional in the serialized form:
/// ```rust
/// use sql_mapper::session::{LocalCacheScope, Settings};
/// use sql_mapper::ExecutorType;
///
/// let settings = Settings::from_json(r#"{
///     "default_executor_type": "reuse",
///     "default_statement_timeout": 5,
///     "local_cache_scope": "statement"
/// }"#).unwrap();
/// assert_eq!(settings.default_executor_type, ExecutorType::Reuse);
/// assert_eq!(settings.local_cache_scope, LocalCacheScope::Statement);
/// assert!(settings.cache_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Wrap executors with the shared second-level cache.
    pub cache_enabled: bool,
    pub default_executor_type: ExecutorType,
    /// Seconds; applied when neither the statement nor the transaction sets a timeout.
    pub default_statement_timeout: Option<u64>,
    /// Auto-map `snake_case` columns onto `camelCase` bean properties.
    pub map_underscore_to_camel_case: bool,
    pub local_cache_scope: LocalCacheScope,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            default_executor_type: ExecutorType::Simple,
            default_statement_timeout: None,
            map_underscore_to_camel_case: false,
            local_cache_scope: LocalCacheScope::Session,
        }
    }
}

impl Settings {
    /// Parse settings from JSON.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for malformed JSON or unknown keys.
    pub fn from_json(json: &str) -> Result<Self, SqlMapperError> {
        serde_json::from_str(json)
            .map_err(|e| SqlMapperError::ConfigError(format!("invalid settings: {e}")))
    }

    #[must_use]
    pub fn statement_timeout(&self) -> Option<Duration> {
        self.default_statement_timeout.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::from_json(r#"{"lazy_loading": true}"#).unwrap_err();
        assert!(matches!(err, SqlMapperError::ConfigError(_)));
    }

    #[test]
    fn timeout_is_in_seconds() {
        let settings = Settings::from_json(r#"{"default_statement_timeout": 3}"#).unwrap();
        assert_eq!(settings.statement_timeout(), Some(Duration::from_secs(3)));
    }
}
