use std::fmt;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;

/// Values that can be stored in a database row or used as statement parameters.
///
/// Every driver binds and extracts through this enum, so mapping code never branches on driver
/// types:
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<chrono::NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Coerce a raw driver value into the requested scalar kind.
    ///
    /// `SQLite` hands back integers for booleans and text for timestamps and JSON; this is where
    /// those representations are folded back into the declared kind.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` when the value cannot represent `kind`.
    pub fn coerce(self, kind: ScalarKind) -> Result<RowValues, SqlMapperError> {
        if self.is_null() {
            return Ok(RowValues::Null);
        }
        let coerced = match kind {
            ScalarKind::Int => match &self {
                RowValues::Int(_) => Some(self.clone()),
                RowValues::Bool(b) => Some(RowValues::Int(i64::from(*b))),
                RowValues::Text(s) => s.trim().parse::<i64>().ok().map(RowValues::Int),
                _ => None,
            },
            ScalarKind::Float => self.as_float().map(RowValues::Float),
            ScalarKind::Text => match &self {
                RowValues::Text(_) => Some(self.clone()),
                RowValues::Int(i) => Some(RowValues::Text(i.to_string())),
                RowValues::Float(f) => Some(RowValues::Text(f.to_string())),
                RowValues::Bool(b) => Some(RowValues::Text(b.to_string())),
                RowValues::Timestamp(ts) => Some(RowValues::Text(ts.to_string())),
                RowValues::JSON(json) => Some(RowValues::Text(json.to_string())),
                _ => None,
            },
            ScalarKind::Bool => self.as_bool().copied().map(RowValues::Bool),
            ScalarKind::Timestamp => self.as_timestamp().map(RowValues::Timestamp),
            ScalarKind::Json => match &self {
                RowValues::JSON(_) => Some(self.clone()),
                RowValues::Text(s) => serde_json::from_str(s).ok().map(RowValues::JSON),
                _ => None,
            },
            ScalarKind::Blob => match &self {
                RowValues::Blob(_) => Some(self.clone()),
                RowValues::Text(s) => Some(RowValues::Blob(s.as_bytes().to_vec())),
                _ => None,
            },
        };
        coerced.ok_or_else(|| {
            SqlMapperError::ParameterError(format!("cannot convert {self:?} to {kind}"))
        })
    }

    /// The scalar kind this value currently holds, `None` for NULL.
    #[must_use]
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            RowValues::Int(_) => Some(ScalarKind::Int),
            RowValues::Float(_) => Some(ScalarKind::Float),
            RowValues::Text(_) => Some(ScalarKind::Text),
            RowValues::Bool(_) => Some(ScalarKind::Bool),
            RowValues::Timestamp(_) => Some(ScalarKind::Timestamp),
            RowValues::JSON(_) => Some(ScalarKind::Json),
            RowValues::Blob(_) => Some(ScalarKind::Blob),
            RowValues::Null => None,
        }
    }
}

impl fmt::Display for RowValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValues::Int(i) => write!(f, "{i}"),
            RowValues::Float(v) => write!(f, "{v}"),
            RowValues::Text(s) => write!(f, "{s}"),
            RowValues::Bool(b) => write!(f, "{b}"),
            RowValues::Timestamp(ts) => write!(f, "{}", ts.format("%F %T%.f")),
            RowValues::Null => write!(f, "null"),
            RowValues::JSON(json) => write!(f, "{json}"),
            RowValues::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Scalar type descriptors used for constructor parameters and column conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Int,
    Float,
    Text,
    Bool,
    Timestamp,
    Json,
    Blob,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::Text => "Text",
            ScalarKind::Bool => "Bool",
            ScalarKind::Timestamp => "Timestamp",
            ScalarKind::Json => "Json",
            ScalarKind::Blob => "Blob",
        };
        f.write_str(name)
    }
}

/// Execution strategy used by a session's executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorType {
    /// A fresh statement handle per call.
    #[default]
    Simple,
    /// Statement handles cached by SQL text for the lifetime of the session.
    Reuse,
    /// Writes are queued and sent to the driver on flush.
    Batch,
}

/// Transaction isolation levels a session can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Kind of operation a mapped statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlCommandType {
    Select,
    Insert,
    Update,
    Delete,
    /// Not a statement: flush pending batch work.
    Flush,
}

impl SqlCommandType {
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(
            self,
            SqlCommandType::Insert | SqlCommandType::Update | SqlCommandType::Delete
        )
    }
}

/// Row window applied while mapping query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl RowBounds {
    pub const NO_ROW_OFFSET: usize = 0;
    pub const NO_ROW_LIMIT: usize = usize::MAX;

    #[must_use]
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == RowBounds::default()
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self {
            offset: Self::NO_ROW_OFFSET,
            limit: Self::NO_ROW_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_sqlite_representations() {
        assert_eq!(
            RowValues::Int(1).coerce(ScalarKind::Bool).unwrap(),
            RowValues::Bool(true)
        );
        let ts = RowValues::Text("2024-03-01 10:20:30".into())
            .coerce(ScalarKind::Timestamp)
            .unwrap();
        assert!(matches!(ts, RowValues::Timestamp(_)));
        assert_eq!(
            RowValues::Null.coerce(ScalarKind::Int).unwrap(),
            RowValues::Null
        );
        assert!(RowValues::Blob(vec![1]).coerce(ScalarKind::Int).is_err());
    }

    #[test]
    fn executor_type_parses_as_value_enum() {
        let parsed = ExecutorType::from_str("batch", true).unwrap();
        assert_eq!(parsed, ExecutorType::Batch);
        assert_eq!(ExecutorType::default(), ExecutorType::Simple);
    }

    #[test]
    fn default_row_bounds_are_unbounded() {
        let bounds = RowBounds::default();
        assert!(bounds.is_default());
        assert_eq!(bounds.limit, usize::MAX);
        assert!(!RowBounds::new(1, 2).is_default());
    }
}
