use std::fmt;
use std::sync::Arc;

use crate::error::SqlMapperError;

use super::invocation::Interceptor;
use super::proxy::Proxyable;
use super::signature::SignatureMap;
use super::wrap_resolved;

/// Interceptors in registration order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Check every interceptor's signatures.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for the first invalid declaration.
    pub fn validate(&self) -> Result<(), SqlMapperError> {
        self.resolve().map(|_| ())
    }

    /// Resolve every interceptor's signatures once, ahead of wrapping.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for the first invalid declaration.
    pub fn resolve(&self) -> Result<ResolvedChain, SqlMapperError> {
        let layers = self
            .interceptors
            .iter()
            .map(|interceptor| {
                SignatureMap::resolve(&interceptor.signatures())
                    .map(|signatures| (Arc::clone(interceptor), signatures))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedChain { layers })
    }

    /// Wrap `target` with every interceptor; the last registered is the outermost.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for the first invalid declaration.
    pub fn plugin_all<T: ?Sized + Proxyable>(
        &self,
        target: Box<T>,
    ) -> Result<Box<T>, SqlMapperError> {
        Ok(self.resolve()?.plugin_all(target))
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

/// An [`InterceptorChain`] whose signatures are already validated.
#[derive(Clone, Default)]
pub struct ResolvedChain {
    layers: Vec<(Arc<dyn Interceptor>, Arc<SignatureMap>)>,
}

impl ResolvedChain {
    #[must_use]
    pub fn plugin_all<T: ?Sized + Proxyable>(&self, target: Box<T>) -> Box<T> {
        self.layers
            .iter()
            .fold(target, |target, (interceptor, signatures)| {
                wrap_resolved(target, interceptor, signatures)
            })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl fmt::Debug for ResolvedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedChain")
            .field("layers", &self.layers.len())
            .finish()
    }
}
