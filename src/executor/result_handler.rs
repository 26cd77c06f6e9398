use std::fmt;
use std::sync::Arc;

use crate::driver::Handle;
use crate::error::SqlMapperError;
use crate::mapping::ResultShape;
use crate::reflection::{Bean, Object, ObjectFactory, ObjectKey, TypeKey};
use crate::results::CustomDbRow;
use crate::types::{RowBounds, RowValues, ScalarKind};

/// Turns driver rows into result objects according to a statement's [`ResultShape`].
#[derive(Clone)]
pub struct RowMapper {
    shape: Arc<ResultShape>,
    factory: Arc<dyn ObjectFactory>,
    map_underscore_to_camel_case: bool,
}

impl fmt::Debug for RowMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowMapper")
            .field("type", &self.shape.type_key)
            .field("map_underscore_to_camel_case", &self.map_underscore_to_camel_case)
            .finish_non_exhaustive()
    }
}

impl RowMapper {
    #[must_use]
    pub fn new(
        shape: Arc<ResultShape>,
        factory: Arc<dyn ObjectFactory>,
        map_underscore_to_camel_case: bool,
    ) -> Self {
        Self {
            shape,
            factory,
            map_underscore_to_camel_case,
        }
    }

    /// Map one row.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Reflection` when the result object cannot be built, or the
    /// error raised while converting or assigning a column.
    pub fn map_row(&self, row: &CustomDbRow) -> Result<Object, SqlMapperError> {
        let type_key = &self.shape.type_key;
        match type_key {
            TypeKey::Scalar(kind) => {
                let value = row.get_by_index(0).cloned().unwrap_or(RowValues::Null);
                Ok(Object::Value(value.coerce(*kind)?))
            }
            TypeKey::Map => {
                let mut map = self.factory.create(type_key)?;
                for (column, value) in row.iter() {
                    map.insert(ObjectKey::from(column), Object::Value(value.clone()))?;
                }
                Ok(map)
            }
            TypeKey::Named(_) => self.map_bean(row),
            _ => {
                let mut collection = self.factory.create(type_key)?;
                for (_, value) in row.iter() {
                    collection.push(Object::Value(value.clone()))?;
                }
                Ok(collection)
            }
        }
    }

    fn map_bean(&self, row: &CustomDbRow) -> Result<Object, SqlMapperError> {
        let shape = &self.shape;
        let mut arg_types = Vec::with_capacity(shape.constructor_args.len());
        let mut args = Vec::with_capacity(shape.constructor_args.len());
        for arg in &shape.constructor_args {
            let value = row.get(&arg.column).cloned().ok_or_else(|| {
                SqlMapperError::ConfigError(format!(
                    "constructor column '{}' is missing from the result set",
                    arg.column
                ))
            })?;
            arg_types.push(arg.kind);
            args.push(value.coerce(arg.kind)?);
        }
        let mut object = self
            .factory
            .create_with(&shape.type_key, &arg_types, &args)?;
        if let Object::Bean(bean) = &mut object {
            self.populate(bean.as_mut(), row)?;
        }
        Ok(object)
    }

    fn populate(&self, bean: &mut dyn Bean, row: &CustomDbRow) -> Result<(), SqlMapperError> {
        let shape = &self.shape;
        for mapping in &shape.mappings {
            if let Some(value) = row.get(&mapping.column) {
                let value = convert(value, mapping.kind)?;
                bean.set_property(&mapping.property, value)?;
            }
        }

        if shape.auto_mapping {
            for (column, value) in row.iter() {
                if shape.is_mapped(column) {
                    continue;
                }
                if let Some(property) = self.auto_property(bean, column) {
                    bean.set_property(&property, value.clone())?;
                }
            }
        }
        Ok(())
    }

    fn auto_property(&self, bean: &dyn Bean, column: &str) -> Option<String> {
        if bean.has_property(column) {
            return Some(column.to_string());
        }
        if self.map_underscore_to_camel_case {
            let camel = underscore_to_camel_case(column);
            if bean.has_property(&camel) {
                return Some(camel);
            }
        }
        None
    }
}

fn convert(value: &RowValues, kind: Option<ScalarKind>) -> Result<RowValues, SqlMapperError> {
    match kind {
        Some(kind) => value.clone().coerce(kind),
        None => Ok(value.clone()),
    }
}

/// `user_name` -> `userName`.
#[must_use]
pub fn underscore_to_camel_case(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut upper_next = false;
    for ch in column.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Read every remaining row of an executed query, keeping those inside `bounds`.
pub(crate) async fn collect_rows(
    handle: &mut dyn Handle,
    mapper: &RowMapper,
    bounds: RowBounds,
) -> Result<Vec<Object>, SqlMapperError> {
    let mut skipped = 0;
    while skipped < bounds.offset {
        if handle.next_row().await?.is_none() {
            return Ok(Vec::new());
        }
        skipped += 1;
    }
    let mut results = Vec::new();
    while results.len() < bounds.limit {
        match handle.next_row().await? {
            Some(row) => results.push(mapper.map_row(&row)?),
            None => break,
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::DefaultObjectFactory;

    fn row(columns: &[&str], values: Vec<RowValues>) -> CustomDbRow {
        CustomDbRow::new(
            Arc::new(columns.iter().map(|c| (*c).to_string()).collect()),
            values,
        )
    }

    fn mapper(shape: ResultShape) -> RowMapper {
        RowMapper::new(Arc::new(shape), Arc::new(DefaultObjectFactory::new()), true)
    }

    #[test]
    fn converts_snake_case() {
        assert_eq!(underscore_to_camel_case("user_name"), "userName");
        assert_eq!(underscore_to_camel_case("ID"), "id");
        assert_eq!(underscore_to_camel_case("_private_col"), "privateCol");
    }

    #[test]
    fn maps_scalars_maps_and_collections() {
        let r = row(&["a", "b"], vec![RowValues::Int(2), RowValues::Int(1)]);

        let scalar = mapper(ResultShape::scalar(ScalarKind::Text)).map_row(&r).unwrap();
        assert_eq!(scalar.as_value(), Some(&RowValues::Text("2".into())));

        let map = mapper(ResultShape::of(TypeKey::Map)).map_row(&r).unwrap();
        assert_eq!(map.property("b"), Some(RowValues::Int(1)));

        let sorted = mapper(ResultShape::of(TypeKey::SortedSet)).map_row(&r).unwrap();
        let Object::SortedSet(set) = sorted else {
            panic!("expected a sorted set");
        };
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            [ObjectKey::Int(1), ObjectKey::Int(2)]
        );
    }
}
