use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::ReflectionError;
use crate::types::{RowValues, ScalarKind};

use super::object::{Bean, Object, TypeKey};

/// Builds result objects from type descriptors.
///
/// Implementations must be shareable: one factory serves every session built from a
/// configuration.
pub trait ObjectFactory: Send + Sync + fmt::Debug {
    /// Build an object with its no-argument constructor.
    ///
    /// # Errors
    /// Returns `ReflectionError` when no such constructor exists or it fails.
    fn create(&self, type_key: &TypeKey) -> Result<Object, ReflectionError> {
        self.create_with(type_key, &[], &[])
    }

    /// Build an object with the constructor matching `arg_types` exactly.
    ///
    /// # Errors
    /// Returns `ReflectionError` carrying the type, the attempted argument types and values.
    fn create_with(
        &self,
        type_key: &TypeKey,
        arg_types: &[ScalarKind],
        args: &[RowValues],
    ) -> Result<Object, ReflectionError>;

    /// Whether `type_key` names a collection (a type the mapper may accumulate columns into).
    fn is_collection(&self, type_key: &TypeKey) -> bool;
}

/// Constructor visibility, checked against [`DefaultObjectFactory::allow_private_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

type BuildFn = dyn Fn(&[RowValues]) -> Result<Box<dyn Bean>, String> + Send + Sync;

/// One registered constructor of a named type.
#[derive(Clone)]
pub struct Constructor {
    arg_types: Vec<ScalarKind>,
    visibility: Visibility,
    build: Arc<BuildFn>,
}

impl Constructor {
    pub fn public<F>(arg_types: impl Into<Vec<ScalarKind>>, build: F) -> Self
    where
        F: Fn(&[RowValues]) -> Result<Box<dyn Bean>, String> + Send + Sync + 'static,
    {
        Self {
            arg_types: arg_types.into(),
            visibility: Visibility::Public,
            build: Arc::new(build),
        }
    }

    pub fn private<F>(arg_types: impl Into<Vec<ScalarKind>>, build: F) -> Self
    where
        F: Fn(&[RowValues]) -> Result<Box<dyn Bean>, String> + Send + Sync + 'static,
    {
        Self {
            visibility: Visibility::Private,
            ..Self::public(arg_types, build)
        }
    }

    #[must_use]
    pub fn arg_types(&self) -> &[ScalarKind] {
        &self.arg_types
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("arg_types", &self.arg_types)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

/// Object factory backed by a registry of constructors keyed by type name.
#[derive(Debug, Clone)]
pub struct DefaultObjectFactory {
    constructors: HashMap<String, Vec<Constructor>>,
    allow_private_access: bool,
}

impl Default for DefaultObjectFactory {
    fn default() -> Self {
        Self {
            constructors: HashMap::new(),
            allow_private_access: true,
        }
    }
}

impl DefaultObjectFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `type_name`. A constructor with the same argument types
    /// replaces the earlier one.
    pub fn register(&mut self, type_name: impl Into<String>, constructor: Constructor) {
        let entry = self.constructors.entry(type_name.into()).or_default();
        entry.retain(|c| c.arg_types != constructor.arg_types);
        entry.push(constructor);
    }

    /// Register the no-argument constructor of a `Default` bean.
    pub fn register_default<T>(&mut self, type_name: impl Into<String>)
    where
        T: Bean + Clone + Default,
    {
        self.register(
            type_name,
            Constructor::public(Vec::new(), |_| Ok(Box::new(T::default()) as Box<dyn Bean>)),
        );
    }

    #[must_use]
    pub fn with_private_access(mut self, allow: bool) -> Self {
        self.allow_private_access = allow;
        self
    }

    #[must_use]
    pub fn allow_private_access(&self) -> bool {
        self.allow_private_access
    }

    fn instantiate_named(
        &self,
        name: &str,
        arg_types: &[ScalarKind],
        args: &[RowValues],
    ) -> Result<Object, String> {
        let constructor = self
            .constructors
            .get(name)
            .and_then(|ctors| ctors.iter().find(|c| c.arg_types == arg_types))
            .ok_or_else(|| {
                if arg_types.is_empty() {
                    format!("{name} has no default constructor")
                } else {
                    format!("{name} has no constructor taking ({})", join_kinds(arg_types))
                }
            })?;
        if constructor.visibility == Visibility::Private && !self.allow_private_access {
            return Err(format!(
                "constructor of {name} is not accessible and private access is disabled"
            ));
        }
        if args.len() != arg_types.len() {
            return Err(format!(
                "expected {} argument(s) but received {}",
                arg_types.len(),
                args.len()
            ));
        }
        (constructor.build)(args).map(Object::Bean)
    }
}

/// Substitute a concrete container for an abstract container request.
#[must_use]
pub fn resolve_interface(type_key: &TypeKey) -> TypeKey {
    match type_key {
        TypeKey::Iterable | TypeKey::Collection | TypeKey::List => TypeKey::List,
        other => other.clone(),
    }
}

fn container_capacity(
    arg_types: &[ScalarKind],
    args: &[RowValues],
) -> Result<usize, String> {
    match (arg_types, args) {
        ([], []) => Ok(0),
        ([ScalarKind::Int], [RowValues::Int(n)]) => {
            usize::try_from(*n).map_err(|_| format!("illegal capacity: {n}"))
        }
        _ => Err("containers accept no arguments or a single Int capacity".to_string()),
    }
}

fn join_kinds(kinds: &[ScalarKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl ObjectFactory for DefaultObjectFactory {
    fn create_with(
        &self,
        type_key: &TypeKey,
        arg_types: &[ScalarKind],
        args: &[RowValues],
    ) -> Result<Object, ReflectionError> {
        let resolved = resolve_interface(type_key);
        let built = match &resolved {
            TypeKey::List => container_capacity(arg_types, args)
                .map(|cap| Object::Sequence(Vec::with_capacity(cap))),
            TypeKey::Map => container_capacity(arg_types, args)
                .map(|cap| Object::Map(HashMap::with_capacity(cap))),
            TypeKey::Set => container_capacity(arg_types, args)
                .map(|cap| Object::Set(HashSet::with_capacity(cap))),
            TypeKey::SortedSet => {
                container_capacity(arg_types, args).map(|_| Object::SortedSet(BTreeSet::new()))
            }
            TypeKey::Scalar(kind) => match (arg_types, args) {
                ([arg_kind], [value]) if arg_kind == kind => value
                    .clone()
                    .coerce(*kind)
                    .map(Object::Value)
                    .map_err(|e| e.to_string()),
                _ => Err(format!("{kind} has no constructor taking ({})", join_kinds(arg_types))),
            },
            TypeKey::Named(name) => self.instantiate_named(name, arg_types, args),
            TypeKey::Iterable | TypeKey::Collection => {
                Err("unresolved container type".to_string())
            }
        };
        built.map_err(|cause| {
            ReflectionError::new(type_key.to_string(), cause).with_args(
                arg_types.iter().map(ToString::to_string).collect(),
                args.iter().map(ToString::to_string).collect(),
            )
        })
    }

    fn is_collection(&self, type_key: &TypeKey) -> bool {
        matches!(
            type_key,
            TypeKey::Collection | TypeKey::List | TypeKey::Set | TypeKey::SortedSet
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqlMapperError;

    #[derive(Debug, Clone, Default)]
    struct Point {
        x: i64,
    }

    impl Bean for Point {
        fn type_name(&self) -> &str {
            "Point"
        }

        fn set_property(&mut self, name: &str, value: RowValues) -> Result<(), SqlMapperError> {
            if name == "x" {
                self.x = value.as_int().copied().unwrap_or_default();
                Ok(())
            } else {
                Err(SqlMapperError::Other(name.to_string()))
            }
        }

        fn get_property(&self, name: &str) -> Option<RowValues> {
            (name == "x").then(|| RowValues::Int(self.x))
        }

        fn has_property(&self, name: &str) -> bool {
            name == "x"
        }
    }

    #[test]
    fn containers_accept_a_capacity() {
        let factory = DefaultObjectFactory::new();
        let list = factory
            .create_with(&TypeKey::List, &[ScalarKind::Int], &[RowValues::Int(16)])
            .unwrap();
        assert!(matches!(list, Object::Sequence(ref v) if v.capacity() >= 16));
        let err = factory
            .create_with(&TypeKey::Map, &[ScalarKind::Text], &[RowValues::Text("x".into())])
            .unwrap_err();
        assert_eq!(err.type_name, "Map");
    }

    #[test]
    fn private_constructors_follow_the_access_flag() {
        let mut factory = DefaultObjectFactory::new();
        factory.register(
            "Point",
            Constructor::private(vec![ScalarKind::Int], |args| {
                Ok(Box::new(Point {
                    x: args[0].as_int().copied().unwrap_or_default(),
                }) as Box<dyn Bean>)
            }),
        );
        let built = factory
            .create_with(&TypeKey::named("Point"), &[ScalarKind::Int], &[RowValues::Int(7)])
            .unwrap();
        assert_eq!(built.as_bean::<Point>().map(|p| p.x), Some(7));

        let locked = factory.with_private_access(false);
        let err = locked
            .create_with(&TypeKey::named("Point"), &[ScalarKind::Int], &[RowValues::Int(7)])
            .unwrap_err();
        assert!(err.cause.contains("not accessible"));
        assert_eq!(err.arg_values, vec!["7".to_string()]);
    }

    #[test]
    fn scalars_need_a_matching_argument() {
        let factory = DefaultObjectFactory::new();
        assert!(factory.create(&TypeKey::Scalar(ScalarKind::Int)).is_err());
        let value = factory
            .create_with(
                &TypeKey::Scalar(ScalarKind::Int),
                &[ScalarKind::Int],
                &[RowValues::Int(3)],
            )
            .unwrap();
        assert_eq!(value.as_value(), Some(&RowValues::Int(3)));
    }
}
