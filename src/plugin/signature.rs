use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::error::SqlMapperError;

/// Interceptable component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Executor,
    StatementHandler,
}

impl Capability {
    /// Every interceptable operation of this capability.
    #[must_use]
    pub fn operations(self) -> &'static [Operation] {
        match self {
            Capability::Executor => EXECUTOR_OPERATIONS,
            Capability::StatementHandler => STATEMENT_HANDLER_OPERATIONS,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Executor => f.write_str("Executor"),
            Capability::StatementHandler => f.write_str("StatementHandler"),
        }
    }
}

/// Parameter types appearing in interceptable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Statement,
    Parameter,
    RowBounds,
    Bool,
    Connection,
    Timeout,
    Handle,
}

/// One interceptable operation: owner, name and parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    pub capability: Capability,
    pub name: &'static str,
    pub params: &'static [ParamType],
}

impl Operation {
    const fn new(capability: Capability, name: &'static str, params: &'static [ParamType]) -> Self {
        Self {
            capability,
            name,
            params,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({:?})", self.capability, self.name, self.params)
    }
}

pub mod executor_ops {
    use super::{Capability, Operation, ParamType};

    pub const UPDATE: Operation = Operation::new(
        Capability::Executor,
        "update",
        &[ParamType::Statement, ParamType::Parameter],
    );
    pub const QUERY: Operation = Operation::new(
        Capability::Executor,
        "query",
        &[ParamType::Statement, ParamType::Parameter, ParamType::RowBounds],
    );
    pub const QUERY_CURSOR: Operation = Operation::new(
        Capability::Executor,
        "query_cursor",
        &[ParamType::Statement, ParamType::Parameter, ParamType::RowBounds],
    );
    pub const FLUSH_STATEMENTS: Operation =
        Operation::new(Capability::Executor, "flush_statements", &[ParamType::Bool]);
    pub const COMMIT: Operation = Operation::new(Capability::Executor, "commit", &[ParamType::Bool]);
    pub const ROLLBACK: Operation =
        Operation::new(Capability::Executor, "rollback", &[ParamType::Bool]);
    pub const CLOSE: Operation = Operation::new(Capability::Executor, "close", &[ParamType::Bool]);
}

pub mod statement_handler_ops {
    use super::{Capability, Operation, ParamType};

    pub const PREPARE: Operation = Operation::new(
        Capability::StatementHandler,
        "prepare",
        &[ParamType::Connection, ParamType::Timeout],
    );
    pub const PARAMETERIZE: Operation = Operation::new(
        Capability::StatementHandler,
        "parameterize",
        &[ParamType::Handle],
    );
    pub const UPDATE: Operation =
        Operation::new(Capability::StatementHandler, "update", &[ParamType::Handle]);
    pub const QUERY: Operation =
        Operation::new(Capability::StatementHandler, "query", &[ParamType::Handle]);
    pub const QUERY_CURSOR: Operation = Operation::new(
        Capability::StatementHandler,
        "query_cursor",
        &[ParamType::Handle],
    );
    pub const BATCH: Operation =
        Operation::new(Capability::StatementHandler, "batch", &[ParamType::Handle]);
}

const EXECUTOR_OPERATIONS: &[Operation] = &[
    executor_ops::UPDATE,
    executor_ops::QUERY,
    executor_ops::QUERY_CURSOR,
    executor_ops::FLUSH_STATEMENTS,
    executor_ops::COMMIT,
    executor_ops::ROLLBACK,
    executor_ops::CLOSE,
];

const STATEMENT_HANDLER_OPERATIONS: &[Operation] = &[
    statement_handler_ops::PREPARE,
    statement_handler_ops::PARAMETERIZE,
    statement_handler_ops::UPDATE,
    statement_handler_ops::QUERY,
    statement_handler_ops::QUERY_CURSOR,
    statement_handler_ops::BATCH,
];

/// An interceptor's declaration of one operation it wants to see.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub capability: Capability,
    pub method: String,
    pub args: Vec<ParamType>,
}

impl Signature {
    #[must_use]
    pub fn new(capability: Capability, method: impl Into<String>, args: &[ParamType]) -> Self {
        Self {
            capability,
            method: method.into(),
            args: args.to_vec(),
        }
    }

    /// Signature matching `operation` exactly.
    #[must_use]
    pub fn of(operation: &Operation) -> Self {
        Self::new(operation.capability, operation.name, operation.params)
    }
}

/// Validated lookup from capability to the operations an interceptor targets.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SignatureMap {
    operations: HashMap<Capability, HashSet<Operation>>,
}

static SIGNATURE_CACHE: LazyLock<RwLock<HashMap<Vec<Signature>, Arc<SignatureMap>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

impl SignatureMap {
    /// Resolve declared signatures against the known operations, memoized process-wide.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when no signature is declared or one names an
    /// operation that does not exist on its capability.
    pub fn resolve(signatures: &[Signature]) -> Result<Arc<SignatureMap>, SqlMapperError> {
        if let Some(found) = SIGNATURE_CACHE
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signatures)
        {
            return Ok(Arc::clone(found));
        }
        let resolved = Arc::new(Self::build(signatures)?);
        let mut cache = SIGNATURE_CACHE
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            cache
                .entry(signatures.to_vec())
                .or_insert(resolved),
        ))
    }

    fn build(signatures: &[Signature]) -> Result<SignatureMap, SqlMapperError> {
        if signatures.is_empty() {
            return Err(SqlMapperError::ConfigError(
                "interceptor declares no signatures".into(),
            ));
        }
        let mut operations: HashMap<Capability, HashSet<Operation>> = HashMap::new();
        for sig in signatures {
            let operation = sig
                .capability
                .operations()
                .iter()
                .find(|op| op.name == sig.method && op.params == sig.args.as_slice())
                .ok_or_else(|| {
                    SqlMapperError::ConfigError(format!(
                        "Could not find method on {} named {} with parameters {:?}",
                        sig.capability, sig.method, sig.args
                    ))
                })?;
            operations
                .entry(sig.capability)
                .or_default()
                .insert(*operation);
        }
        Ok(SignatureMap { operations })
    }

    #[must_use]
    pub fn contains_capability(&self, capability: Capability) -> bool {
        self.operations.contains_key(&capability)
    }

    #[must_use]
    pub fn matches(&self, operation: &Operation) -> bool {
        self.operations
            .get(&operation.capability)
            .is_some_and(|ops| ops.contains(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_and_memoizes() {
        let sigs = vec![Signature::of(&executor_ops::UPDATE)];
        let first = SignatureMap::resolve(&sigs).unwrap();
        let second = SignatureMap::resolve(&sigs).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.matches(&executor_ops::UPDATE));
        assert!(!first.matches(&executor_ops::QUERY));
        assert!(!first.contains_capability(Capability::StatementHandler));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let sigs = vec![Signature::new(
            Capability::Executor,
            "update",
            &[ParamType::Statement],
        )];
        let err = SignatureMap::resolve(&sigs).unwrap_err();
        assert!(err.to_string().contains("Could not find method on Executor named update"));
        assert!(SignatureMap::resolve(&[]).is_err());
    }
}
