use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::binding::{Contract, MapperRegistry};
use crate::cache::{Cache, LruCache, PerpetualCache};
use crate::error::SqlMapperError;
use crate::executor::{
    BatchExecutor, BatchStrategy, CachingExecutor, DefaultStatementHandler, Executor,
    ReuseExecutor, ReuseStrategy, RowMapper, SimpleExecutor, SimpleStrategy, StatementHandler,
};
use crate::mapping::{BoundSql, MappedStatement, StatementRegistry};
use crate::plugin::{Interceptor, InterceptorChain, ResolvedChain};
use crate::reflection::{DefaultObjectFactory, ObjectFactory};
use crate::transaction::Transaction;
use crate::types::{ExecutorType, RowBounds};

use super::environment::Environment;
use super::settings::Settings;

/// Everything a session factory needs, frozen at build time.
pub struct Configuration {
    settings: Settings,
    environment: Option<Environment>,
    statements: StatementRegistry,
    mappers: MapperRegistry,
    interceptors: InterceptorChain,
    object_factory: Arc<dyn ObjectFactory>,
    caches: HashMap<String, Arc<dyn Cache>>,
}

impl Configuration {
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    #[must_use]
    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    /// Look a statement up by qualified or short id.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for an unknown or ambiguous id.
    pub fn statement(&self, id: &str) -> Result<Arc<MappedStatement>, SqlMapperError> {
        self.statements.get(id)
    }

    #[must_use]
    pub fn mappers(&self) -> &MapperRegistry {
        &self.mappers
    }

    #[must_use]
    pub fn interceptor_chain(&self) -> &InterceptorChain {
        &self.interceptors
    }

    #[must_use]
    pub fn object_factory(&self) -> &Arc<dyn ObjectFactory> {
        &self.object_factory
    }

    /// Shared cache registered under `namespace`.
    #[must_use]
    pub fn cache(&self, namespace: &str) -> Option<Arc<dyn Cache>> {
        self.caches.get(namespace).map(Arc::clone)
    }

    /// Build the executor a session runs on: the strategy for `executor_type`, the shared
    /// cache decorator when enabled, then every interceptor.
    #[must_use]
    pub fn new_executor(
        self: &Arc<Self>,
        transaction: Box<dyn Transaction>,
        executor_type: ExecutorType,
        chain: &ResolvedChain,
    ) -> Box<dyn Executor> {
        let configuration = Arc::clone(self);
        let executor: Box<dyn Executor> = match executor_type {
            ExecutorType::Simple => Box::new(SimpleExecutor::new(
                configuration,
                transaction,
                SimpleStrategy,
            )),
            ExecutorType::Reuse => Box::new(ReuseExecutor::new(
                configuration,
                transaction,
                ReuseStrategy::default(),
            )),
            ExecutorType::Batch => Box::new(BatchExecutor::new(
                configuration,
                transaction,
                BatchStrategy::default(),
            )),
        };
        let executor: Box<dyn Executor> = if self.settings.cache_enabled {
            Box::new(CachingExecutor::new(executor, Arc::clone(self)))
        } else {
            executor
        };
        chain.plugin_all(executor)
    }

    /// Build the interceptable statement handler for one call.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when an interceptor's signatures are invalid.
    pub fn new_statement_handler(
        &self,
        statement: &Arc<MappedStatement>,
        bounds: RowBounds,
        bound_sql: BoundSql,
    ) -> Result<Box<dyn StatementHandler>, SqlMapperError> {
        let mapper = RowMapper::new(
            Arc::clone(statement.result_shape()),
            Arc::clone(&self.object_factory),
            self.settings.map_underscore_to_camel_case,
        );
        let handler: Box<dyn StatementHandler> = Box::new(DefaultStatementHandler::new(
            Arc::clone(statement),
            bound_sql,
            bounds,
            mapper,
        ));
        self.interceptors.plugin_all(handler)
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("settings", &self.settings)
            .field("environment", &self.environment)
            .field("statements", &self.statements.len())
            .field("interceptors", &self.interceptors)
            .field("caches", &self.caches.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`Configuration`]; every registration is validated by
/// [`build`](ConfigurationBuilder::build).
#[derive(Default)]
pub struct ConfigurationBuilder {
    settings: Settings,
    environment: Option<Environment>,
    statements: Vec<MappedStatement>,
    contracts: Vec<Contract>,
    interceptors: InterceptorChain,
    object_factory: Option<Arc<dyn ObjectFactory>>,
    caches: Vec<Arc<dyn Cache>>,
}

impl ConfigurationBuilder {
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    #[must_use]
    pub fn statement(mut self, statement: MappedStatement) -> Self {
        self.statements.push(statement);
        self
    }

    #[must_use]
    pub fn statements(mut self, statements: impl IntoIterator<Item = MappedStatement>) -> Self {
        self.statements.extend(statements);
        self
    }

    #[must_use]
    pub fn mapper(mut self, contract: Contract) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Register an interceptor; later registrations wrap earlier ones.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.add(interceptor);
        self
    }

    #[must_use]
    pub fn object_factory(mut self, factory: Arc<dyn ObjectFactory>) -> Self {
        self.object_factory = Some(factory);
        self
    }

    /// Register a shared cache under its id.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.caches.push(cache);
        self
    }

    /// Register an unbounded shared cache for `namespace`.
    #[must_use]
    pub fn perpetual_cache(self, namespace: impl Into<String>) -> Self {
        self.cache(Arc::new(PerpetualCache::new(namespace)))
    }

    /// Register a shared cache for `namespace` holding at most `capacity` results.
    #[must_use]
    pub fn lru_cache(self, namespace: impl Into<String>, capacity: usize) -> Self {
        let delegate = Box::new(PerpetualCache::new(namespace));
        self.cache(Arc::new(LruCache::new(delegate, capacity)))
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for a duplicate statement id, mapper namespace or
    /// cache id, an invalid interceptor signature, or a statement naming an unregistered cache.
    pub fn build(self) -> Result<Arc<Configuration>, SqlMapperError> {
        let mut caches: HashMap<String, Arc<dyn Cache>> = HashMap::new();
        for cache in self.caches {
            let id = cache.id().to_string();
            if caches.insert(id.clone(), cache).is_some() {
                return Err(SqlMapperError::ConfigError(format!(
                    "Caches collection already contains value for {id}"
                )));
            }
        }

        let mut statements = StatementRegistry::new();
        for statement in self.statements {
            if let Some(namespace) = statement.cache_namespace()
                && !caches.contains_key(namespace)
            {
                return Err(SqlMapperError::ConfigError(format!(
                    "No cache for namespace '{namespace}' could be found (statement '{}')",
                    statement.id()
                )));
            }
            statements.add(statement)?;
        }

        let mut mappers = MapperRegistry::new();
        for contract in self.contracts {
            mappers.add(contract)?;
        }

        self.interceptors.validate()?;

        debug!(
            statements = statements.len(),
            interceptors = self.interceptors.len(),
            caches = caches.len(),
            "configuration built"
        );
        Ok(Arc::new(Configuration {
            settings: self.settings,
            environment: self.environment,
            statements,
            mappers,
            interceptors: self.interceptors,
            object_factory: self
                .object_factory
                .unwrap_or_else(|| Arc::new(DefaultObjectFactory::new())),
            caches,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlCommandType;

    fn select(id: &str) -> MappedStatement {
        MappedStatement::builder(id, SqlCommandType::Select, "SELECT 1")
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_statement_ids_are_rejected() {
        let err = Configuration::builder()
            .statement(select("users.find"))
            .statement(select("users.find"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("already contains value for users.find"));
    }

    #[test]
    fn statements_must_reference_registered_caches() {
        let statement = MappedStatement::builder("users.find", SqlCommandType::Select, "SELECT 1")
            .cache_namespace("users")
            .build()
            .unwrap();
        let err = Configuration::builder()
            .statement(statement.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ConfigError(_)));

        let configuration = Configuration::builder()
            .lru_cache("users", 16)
            .statement(statement)
            .build()
            .unwrap();
        assert!(configuration.cache("users").is_some());
    }
}
