use std::collections::BTreeMap;
use std::fmt;

use crate::error::SqlMapperError;
use crate::reflection::Bean;
use crate::types::RowValues;

/// The value a statement's `#{...}` markers are resolved against.
///
/// A single scalar answers every marker. Maps may nest, so `#{user.name}` reads the `name`
/// property of the `user` entry.
#[derive(Default)]
pub enum Parameter {
    #[default]
    None,
    Value(RowValues),
    Map(BTreeMap<String, Parameter>),
    Bean(Box<dyn Bean>),
}

impl Parameter {
    /// Start an empty named map.
    #[must_use]
    pub fn map() -> Self {
        Parameter::Map(BTreeMap::new())
    }

    /// Add an entry to a named map; ignored for any other variant.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Parameter>) -> Self {
        if let Parameter::Map(entries) = &mut self {
            entries.insert(name.into(), value.into());
        }
        self
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Parameter::None)
    }

    /// Resolve a (possibly dotted) property path.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` when the path does not exist.
    pub fn resolve(&self, path: &str) -> Result<RowValues, SqlMapperError> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match self {
            Parameter::None => Err(SqlMapperError::ParameterError(format!(
                "no parameter was supplied for '{path}'"
            ))),
            Parameter::Value(value) => Ok(value.clone()),
            Parameter::Map(entries) => {
                let entry = entries.get(head).ok_or_else(|| {
                    let available = entries.keys().cloned().collect::<Vec<_>>().join(", ");
                    SqlMapperError::ParameterError(format!(
                        "Parameter '{head}' not found. Available parameters are [{available}]"
                    ))
                })?;
                match rest {
                    Some(rest) => entry.resolve(rest),
                    None => entry.leaf(head),
                }
            }
            Parameter::Bean(bean) => {
                if rest.is_some() {
                    return Err(SqlMapperError::ParameterError(format!(
                        "property path '{path}' descends into scalar property '{head}' of {}",
                        bean.type_name()
                    )));
                }
                bean.get_property(head).ok_or_else(|| {
                    SqlMapperError::ParameterError(format!(
                        "There is no getter for property named '{head}' in '{}'",
                        bean.type_name()
                    ))
                })
            }
        }
    }

    fn leaf(&self, name: &str) -> Result<RowValues, SqlMapperError> {
        match self {
            Parameter::None => Ok(RowValues::Null),
            Parameter::Value(value) => Ok(value.clone()),
            Parameter::Map(_) | Parameter::Bean(_) => Err(SqlMapperError::ParameterError(
                format!("parameter '{name}' is not a scalar value"),
            )),
        }
    }
}

impl Clone for Parameter {
    fn clone(&self) -> Self {
        match self {
            Parameter::None => Parameter::None,
            Parameter::Value(v) => Parameter::Value(v.clone()),
            Parameter::Map(entries) => Parameter::Map(entries.clone()),
            Parameter::Bean(bean) => Parameter::Bean(bean.clone_box()),
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::None => f.write_str("None"),
            Parameter::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Parameter::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Parameter::Bean(bean) => f.debug_tuple("Bean").field(bean).finish(),
        }
    }
}

impl From<()> for Parameter {
    fn from((): ()) -> Self {
        Parameter::None
    }
}

impl From<RowValues> for Parameter {
    fn from(value: RowValues) -> Self {
        Parameter::Value(value)
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Parameter::Value(RowValues::Int(value))
    }
}

impl From<i32> for Parameter {
    fn from(value: i32) -> Self {
        Parameter::Value(RowValues::from(value))
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Parameter::Value(RowValues::Float(value))
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Parameter::Value(RowValues::Bool(value))
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::Value(RowValues::from(value))
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Parameter::Value(RowValues::Text(value))
    }
}

impl From<Box<dyn Bean>> for Parameter {
    fn from(bean: Box<dyn Bean>) -> Self {
        Parameter::Bean(bean)
    }
}

impl From<BTreeMap<String, Parameter>> for Parameter {
    fn from(entries: BTreeMap<String, Parameter>) -> Self {
        Parameter::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_answers_any_name() {
        let p = Parameter::from(42);
        assert_eq!(p.resolve("id").unwrap(), RowValues::Int(42));
        assert_eq!(p.resolve("anything").unwrap(), RowValues::Int(42));
    }

    #[test]
    fn nested_maps_resolve_dotted_paths() {
        let p = Parameter::map()
            .with("user", Parameter::map().with("name", "ann"))
            .with("limit", 10);
        assert_eq!(p.resolve("user.name").unwrap(), RowValues::Text("ann".into()));
        assert_eq!(p.resolve("limit").unwrap(), RowValues::Int(10));
        let err = p.resolve("offset").unwrap_err().to_string();
        assert!(err.contains("Available parameters are [limit, user]"));
    }

    #[test]
    fn missing_parameter_is_an_error() {
        assert!(Parameter::None.resolve("id").is_err());
    }
}
