//! Contracts bound to mapped statements.
//!
//! A [`Contract`] is plain data: a namespace and the operations it offers. Each operation
//! resolves to the statement `namespace.operation`, or runs its default body. Invokers are
//! built on first use and shared by every session through the contract's [`DispatchTable`].

pub mod contract;
pub mod params;
pub mod proxy;
pub mod registry;

pub use contract::{Arg, BoxFuture, Contract, DefaultBody, OperationDecl, ReturnShape};
pub use params::{GENERIC_NAME_PREFIX, ParamNameResolver};
pub use proxy::{MapperProxy, ReturnValue};
pub use registry::{DispatchTable, MapperMethod, MapperRegistry, MethodInvoker};
