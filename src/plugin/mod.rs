//! Interception of executor and statement-handler operations.
//!
//! An [`Interceptor`] declares the operations it wants to see as [`Signature`]s. Wrapping a
//! component returns a proxy that routes those operations through
//! [`Interceptor::intercept`]; every other operation goes straight to the component. Components
//! exposing none of the declared capabilities are returned unchanged.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use sql_mapper::plugin::{Interceptor, Invocation, Outcome, Signature, executor_ops};
//! use sql_mapper::SqlMapperError;
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Interceptor for Audit {
//!     fn signatures(&self) -> Vec<Signature> {
//!         vec![Signature::of(&executor_ops::UPDATE)]
//!     }
//!
//!     async fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, SqlMapperError> {
//!         tracing::info!(operation = %invocation.operation(), "audited");
//!         invocation.proceed().await
//!     }
//! }
//! ```

pub mod chain;
pub mod invocation;
pub mod proxy;
pub mod signature;

use std::sync::Arc;

use crate::error::SqlMapperError;

pub use chain::{InterceptorChain, ResolvedChain};
pub use invocation::{Args, Interceptor, Invocation, Outcome, Target};
pub use proxy::{ExecutorProxy, Proxyable, StatementHandlerProxy};
pub use signature::{
    Capability, Operation, ParamType, Signature, SignatureMap, executor_ops,
    statement_handler_ops,
};

/// Reports the capabilities a component exposes, including those reached through delegation.
pub trait Pluggable {
    fn capabilities(&self) -> Vec<Capability>;
}

/// Wrap `target` with `interceptor`.
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` when the interceptor's signatures are invalid.
pub fn wrap<T: ?Sized + Proxyable>(
    target: Box<T>,
    interceptor: &Arc<dyn Interceptor>,
) -> Result<Box<T>, SqlMapperError> {
    let signatures = SignatureMap::resolve(&interceptor.signatures())?;
    Ok(wrap_resolved(target, interceptor, &signatures))
}

pub(crate) fn wrap_resolved<T: ?Sized + Proxyable>(
    target: Box<T>,
    interceptor: &Arc<dyn Interceptor>,
    signatures: &Arc<SignatureMap>,
) -> Box<T> {
    let exposed = target
        .capabilities()
        .into_iter()
        .any(|capability| capability == T::CAPABILITY && signatures.contains_capability(capability));
    if exposed {
        T::proxy(target, Arc::clone(interceptor), Arc::clone(signatures))
    } else {
        target
    }
}
