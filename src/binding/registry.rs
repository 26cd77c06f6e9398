use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::SqlMapperError;
use crate::mapping::{MappedStatement, StatementRegistry};

use super::contract::{Contract, DefaultBody, ReturnShape};
use super::params::ParamNameResolver;

/// Executes one contract operation through its mapped statement.
#[derive(Debug, Clone)]
pub struct MapperMethod {
    pub(crate) statement: Option<Arc<MappedStatement>>,
    pub(crate) returns: ReturnShape,
    pub(crate) params: ParamNameResolver,
    pub(crate) name: String,
}

/// What a dispatch-table entry does when invoked.
#[derive(Clone)]
pub enum MethodInvoker {
    Mapped(MapperMethod),
    Default(DefaultBody),
}

impl fmt::Debug for MethodInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodInvoker::Mapped(method) => f.debug_tuple("Mapped").field(method).finish(),
            MethodInvoker::Default(_) => f.write_str("Default"),
        }
    }
}

/// Invokers of one contract, filled in on first use of each operation.
pub struct DispatchTable {
    contract: Arc<Contract>,
    invokers: RwLock<HashMap<String, Arc<MethodInvoker>>>,
}

impl DispatchTable {
    fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            invokers: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Look up, building on first use, the invoker of `operation`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when the contract has no such operation or its
    /// statement is not registered.
    pub fn invoker(
        &self,
        operation: &str,
        statements: &StatementRegistry,
    ) -> Result<Arc<MethodInvoker>, SqlMapperError> {
        if let Some(found) = self
            .invokers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
        {
            return Ok(Arc::clone(found));
        }
        let built = Arc::new(self.build(operation, statements)?);
        let mut invokers = self.invokers.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            invokers.entry(operation.to_string()).or_insert(built),
        ))
    }

    fn build(
        &self,
        operation: &str,
        statements: &StatementRegistry,
    ) -> Result<MethodInvoker, SqlMapperError> {
        let namespace = self.contract.namespace();
        let decl = self.contract.find(operation).ok_or_else(|| {
            SqlMapperError::ConfigError(format!(
                "Mapper '{namespace}' declares no operation named '{operation}'"
            ))
        })?;
        if let Some(body) = decl.body() {
            return Ok(MethodInvoker::Default(Arc::clone(body)));
        }
        let statement_id = format!("{namespace}.{operation}");
        let statement = if decl.returns() == &ReturnShape::BatchResults {
            statements.get(&statement_id).ok()
        } else {
            Some(statements.get(&statement_id).map_err(|_| {
                SqlMapperError::ConfigError(format!(
                    "Invalid bound statement (not found): {statement_id}"
                ))
            })?)
        };
        debug!(statement = %statement_id, "built mapper method");
        Ok(MethodInvoker::Mapped(MapperMethod {
            statement,
            returns: decl.returns().clone(),
            params: ParamNameResolver::new(decl.param_names()),
            name: statement_id,
        }))
    }
}

/// Registered contracts by namespace.
#[derive(Default)]
pub struct MapperRegistry {
    tables: HashMap<String, Arc<DispatchTable>>,
}

impl MapperRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when the namespace is already registered.
    pub fn add(&mut self, contract: Contract) -> Result<(), SqlMapperError> {
        let namespace = contract.namespace().to_string();
        if self.tables.contains_key(&namespace) {
            return Err(SqlMapperError::ConfigError(format!(
                "Type {namespace} is already known to the MapperRegistry."
            )));
        }
        self.tables
            .insert(namespace, Arc::new(DispatchTable::new(Arc::new(contract))));
        Ok(())
    }

    #[must_use]
    pub fn has_mapper(&self, namespace: &str) -> bool {
        self.tables.contains_key(namespace)
    }

    /// Dispatch table of `namespace`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when no contract was registered under it.
    pub fn dispatch_table(&self, namespace: &str) -> Result<Arc<DispatchTable>, SqlMapperError> {
        self.tables.get(namespace).map(Arc::clone).ok_or_else(|| {
            SqlMapperError::ConfigError(format!(
                "Type {namespace} is not known to the MapperRegistry."
            ))
        })
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::OperationDecl;
    use crate::types::SqlCommandType;

    fn statements() -> StatementRegistry {
        let mut registry = StatementRegistry::new();
        registry
            .add(
                MappedStatement::builder(
                    "UserMapper.findById",
                    SqlCommandType::Select,
                    "SELECT * FROM users WHERE id = #{id}",
                )
                .build()
                .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_namespace_is_rejected() {
        let mut registry = MapperRegistry::new();
        registry.add(Contract::new("UserMapper")).unwrap();
        let err = registry.add(Contract::new("UserMapper")).unwrap_err();
        assert!(err.to_string().contains("already known"));
    }

    #[test]
    fn invokers_are_memoized() {
        let mut registry = MapperRegistry::new();
        registry
            .add(
                Contract::new("UserMapper")
                    .operation(OperationDecl::new("findById", ReturnShape::One).param("id"))
                    .operation(OperationDecl::new("missing", ReturnShape::Many)),
            )
            .unwrap();
        let table = registry.dispatch_table("UserMapper").unwrap();
        let statements = statements();
        let first = table.invoker("findById", &statements).unwrap();
        let second = table.invoker("findById", &statements).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let err = table.invoker("missing", &statements).unwrap_err();
        assert!(err.to_string().contains("Invalid bound statement (not found): UserMapper.missing"));
    }
}
