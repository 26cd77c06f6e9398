use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;
use crate::types::{RowValues, ScalarKind};

/// Type descriptor handed to the object factory.
///
/// Abstract container requests (`Iterable`, `Collection`, `List`, `Map`, `SortedSet`, `Set`) are
/// substituted with concrete containers; `Named` types are looked up in the constructor registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Iterable,
    Collection,
    List,
    Map,
    SortedSet,
    Set,
    Scalar(ScalarKind),
    Named(String),
}

impl TypeKey {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        TypeKey::Named(name.into())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Iterable => f.write_str("Iterable"),
            TypeKey::Collection => f.write_str("Collection"),
            TypeKey::List => f.write_str("List"),
            TypeKey::Map => f.write_str("Map"),
            TypeKey::SortedSet => f.write_str("SortedSet"),
            TypeKey::Set => f.write_str("Set"),
            TypeKey::Scalar(kind) => write!(f, "{kind}"),
            TypeKey::Named(name) => f.write_str(name),
        }
    }
}

/// A user type the object factory can build and the row mapper can populate.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// #[derive(Debug, Clone, Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Bean for User {
///     fn type_name(&self) -> &str {
///         "User"
///     }
///
///     fn set_property(&mut self, name: &str, value: RowValues) -> Result<(), SqlMapperError> {
///         match name {
///             "id" => self.id = value.as_int().copied().unwrap_or_default(),
///             "name" => self.name = value.as_text().unwrap_or_default().to_string(),
///             other => return Err(SqlMapperError::Other(format!("no property {other}"))),
///         }
///         Ok(())
///     }
///
///     fn get_property(&self, name: &str) -> Option<RowValues> {
///         match name {
///             "id" => Some(RowValues::Int(self.id)),
///             "name" => Some(RowValues::Text(self.name.clone())),
///             _ => None,
///         }
///     }
///
///     fn has_property(&self, name: &str) -> bool {
///         matches!(name, "id" | "name")
///     }
/// }
/// ```
pub trait Bean: BeanBase + fmt::Debug + Send + Sync {
    /// Name the type is registered under in the object factory.
    fn type_name(&self) -> &str;

    /// Assign one property.
    ///
    /// # Errors
    /// Returns an error when the property does not exist or the value does not fit it.
    fn set_property(&mut self, name: &str, value: RowValues) -> Result<(), SqlMapperError>;

    fn get_property(&self, name: &str) -> Option<RowValues>;

    fn has_property(&self, name: &str) -> bool;
}

/// Object-safe plumbing every [`Bean`] gets for free when it is `Clone`.
pub trait BeanBase: Any {
    fn clone_box(&self) -> Box<dyn Bean>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Bean + Clone> BeanBase for T {
    fn clone_box(&self) -> Box<dyn Bean> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A float usable as a set member or map key, ordered with `f64::total_cmp`.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Hashable, totally ordered scalar used for set members and map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(FloatKey),
    Text(String),
    Timestamp(NaiveDateTime),
    Json(String),
    Blob(Vec<u8>),
}

impl From<RowValues> for ObjectKey {
    fn from(value: RowValues) -> Self {
        match value {
            RowValues::Int(i) => ObjectKey::Int(i),
            RowValues::Float(f) => ObjectKey::Float(FloatKey(f)),
            RowValues::Text(s) => ObjectKey::Text(s),
            RowValues::Bool(b) => ObjectKey::Bool(b),
            RowValues::Timestamp(ts) => ObjectKey::Timestamp(ts),
            RowValues::Null => ObjectKey::Null,
            RowValues::JSON(json) => ObjectKey::Json(json.to_string()),
            RowValues::Blob(bytes) => ObjectKey::Blob(bytes),
        }
    }
}

impl From<&str> for ObjectKey {
    fn from(value: &str) -> Self {
        ObjectKey::Text(value.to_string())
    }
}

impl From<i64> for ObjectKey {
    fn from(value: i64) -> Self {
        ObjectKey::Int(value)
    }
}

impl From<ObjectKey> for RowValues {
    fn from(key: ObjectKey) -> Self {
        match key {
            ObjectKey::Null => RowValues::Null,
            ObjectKey::Bool(b) => RowValues::Bool(b),
            ObjectKey::Int(i) => RowValues::Int(i),
            ObjectKey::Float(f) => RowValues::Float(f.0),
            ObjectKey::Text(s) => RowValues::Text(s),
            ObjectKey::Timestamp(ts) => RowValues::Timestamp(ts),
            ObjectKey::Json(raw) => {
                serde_json::from_str(&raw).map_or(RowValues::Text(raw), RowValues::JSON)
            }
            ObjectKey::Blob(bytes) => RowValues::Blob(bytes),
        }
    }
}

/// A materialized result object.
#[derive(Debug)]
pub enum Object {
    Value(RowValues),
    Sequence(Vec<Object>),
    Map(HashMap<ObjectKey, Object>),
    SortedSet(BTreeSet<ObjectKey>),
    Set(HashSet<ObjectKey>),
    Bean(Box<dyn Bean>),
}

impl Clone for Object {
    fn clone(&self) -> Self {
        match self {
            Object::Value(v) => Object::Value(v.clone()),
            Object::Sequence(items) => Object::Sequence(items.clone()),
            Object::Map(map) => Object::Map(map.clone()),
            Object::SortedSet(set) => Object::SortedSet(set.clone()),
            Object::Set(set) => Object::Set(set.clone()),
            Object::Bean(bean) => Object::Bean(bean.clone_box()),
        }
    }
}

impl Object {
    /// Append to a sequence or insert into a set.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Other` when `self` is not a collection.
    pub fn push(&mut self, item: Object) -> Result<(), SqlMapperError> {
        match self {
            Object::Sequence(items) => items.push(item),
            Object::SortedSet(set) => {
                set.insert(item.into_key()?);
            }
            Object::Set(set) => {
                set.insert(item.into_key()?);
            }
            other => {
                return Err(SqlMapperError::Other(format!(
                    "cannot add an element to {}",
                    other.describe()
                )));
            }
        }
        Ok(())
    }

    /// Insert an entry into a map object.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Other` when `self` is not a map.
    pub fn insert(&mut self, key: impl Into<ObjectKey>, value: Object) -> Result<(), SqlMapperError> {
        if let Object::Map(map) = self {
            map.insert(key.into(), value);
            Ok(())
        } else {
            Err(SqlMapperError::Other(format!(
                "cannot insert an entry into {}",
                self.describe()
            )))
        }
    }

    /// Read a named property: a map entry keyed by text, or a bean property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<RowValues> {
        match self {
            Object::Map(map) => map
                .get(&ObjectKey::Text(name.to_string()))
                .and_then(Object::as_value)
                .cloned(),
            Object::Bean(bean) => bean.get_property(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&RowValues> {
        if let Object::Value(v) = self { Some(v) } else { None }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Object]> {
        if let Object::Sequence(items) = self {
            Some(items)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&HashMap<ObjectKey, Object>> {
        if let Object::Map(map) = self { Some(map) } else { None }
    }

    #[must_use]
    pub fn as_bean<T: Bean>(&self) -> Option<&T> {
        if let Object::Bean(bean) = self {
            bean.as_any().downcast_ref::<T>()
        } else {
            None
        }
    }

    #[must_use]
    pub fn into_bean<T: Bean>(self) -> Option<T> {
        if let Object::Bean(bean) = self {
            bean.into_any().downcast::<T>().ok().map(|b| *b)
        } else {
            None
        }
    }

    /// Number of elements of a container, `1` for scalars and beans.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Object::Sequence(items) => items.len(),
            Object::Map(map) => map.len(),
            Object::SortedSet(set) => set.len(),
            Object::Set(set) => set.len(),
            Object::Value(_) | Object::Bean(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert a scalar object into a key usable in sets and maps.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Other` for containers and beans.
    pub fn into_key(self) -> Result<ObjectKey, SqlMapperError> {
        match self {
            Object::Value(v) => Ok(ObjectKey::from(v)),
            other => Err(SqlMapperError::Other(format!(
                "{} cannot be used as a set member or map key",
                other.describe()
            ))),
        }
    }

    fn describe(&self) -> String {
        match self {
            Object::Value(v) => format!("value {v}"),
            Object::Sequence(_) => "a sequence".to_string(),
            Object::Map(_) => "a map".to_string(),
            Object::SortedSet(_) => "a sorted set".to_string(),
            Object::Set(_) => "a set".to_string(),
            Object::Bean(bean) => format!("bean {}", bean.type_name()),
        }
    }
}

impl From<RowValues> for Object {
    fn from(value: RowValues) -> Self {
        Object::Value(value)
    }
}

/// Conversion out of a result object into a caller's type.
pub trait FromObject: Sized {
    /// # Errors
    /// Returns `SqlMapperError::Other` when the object does not hold a `Self`.
    fn from_object(object: Object) -> Result<Self, SqlMapperError>;
}

fn mismatch(expected: &str, object: &Object) -> SqlMapperError {
    SqlMapperError::Other(format!("expected {expected} but found {}", object.describe()))
}

impl FromObject for Object {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        Ok(object)
    }
}

impl FromObject for RowValues {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        match object {
            Object::Value(v) => Ok(v),
            other => Err(mismatch("a scalar value", &other)),
        }
    }
}

impl FromObject for i64 {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        match object {
            Object::Value(RowValues::Int(i)) => Ok(i),
            other => Err(mismatch("an integer", &other)),
        }
    }
}

impl FromObject for f64 {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        match object.as_value().and_then(RowValues::as_float) {
            Some(f) => Ok(f),
            None => Err(mismatch("a float", &object)),
        }
    }
}

impl FromObject for bool {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        match object.as_value().and_then(RowValues::as_bool) {
            Some(b) => Ok(*b),
            None => Err(mismatch("a boolean", &object)),
        }
    }
}

impl FromObject for String {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        match object {
            Object::Value(RowValues::Text(s)) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromObject for NaiveDateTime {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        match object.as_value().and_then(RowValues::as_timestamp) {
            Some(ts) => Ok(ts),
            None => Err(mismatch("a timestamp", &object)),
        }
    }
}

impl FromObject for JsonValue {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        match object {
            Object::Value(RowValues::JSON(json)) => Ok(json),
            other => Err(mismatch("a JSON value", &other)),
        }
    }
}

impl<T: Bean + Clone> FromObject for T {
    fn from_object(object: Object) -> Result<Self, SqlMapperError> {
        if let Object::Bean(bean) = object {
            let name = bean.type_name().to_string();
            bean.into_any()
                .downcast::<T>()
                .map(|b| *b)
                .map_err(|_| SqlMapperError::Other(format!("bean {name} has a different type")))
        } else {
            Err(mismatch("a bean", &object))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_set_orders_mixed_numbers() {
        let mut set = Object::SortedSet(BTreeSet::new());
        for v in [3, 1, 2] {
            set.push(Object::Value(RowValues::Int(v))).unwrap();
        }
        let Object::SortedSet(inner) = set else {
            panic!("expected a sorted set");
        };
        let ordered: Vec<_> = inner.into_iter().collect();
        assert_eq!(ordered, [ObjectKey::Int(1), ObjectKey::Int(2), ObjectKey::Int(3)]);
    }

    #[test]
    fn push_rejects_non_collections() {
        let mut value = Object::Value(RowValues::Int(1));
        assert!(value.push(Object::Value(RowValues::Int(2))).is_err());
    }

    #[test]
    fn float_keys_use_total_order() {
        assert!(FloatKey(-1.0) < FloatKey(0.5));
        assert_eq!(FloatKey(f64::NAN), FloatKey(f64::NAN));
    }

    #[test]
    fn map_property_reads_text_keys() {
        let mut map = Object::Map(HashMap::new());
        map.insert("name", Object::Value(RowValues::Text("ann".into())))
            .unwrap();
        assert_eq!(map.property("name"), Some(RowValues::Text("ann".into())));
        assert_eq!(map.property("missing"), None);
    }
}
