//! Result objects and the factory that builds them.

pub mod factory;
pub mod object;

pub use factory::{Constructor, DefaultObjectFactory, ObjectFactory, Visibility, resolve_interface};
pub use object::{Bean, BeanBase, FloatKey, FromObject, Object, ObjectKey, TypeKey};
