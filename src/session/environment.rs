use std::fmt;
use std::sync::Arc;

use crate::driver::DataSource;
use crate::transaction::TransactionFactory;

/// Where sessions get their connections and transactions from.
///
/// Without a transaction factory, sessions use
/// [`ManagedTransactionFactory`](crate::transaction::ManagedTransactionFactory).
#[derive(Clone)]
pub struct Environment {
    id: String,
    data_source: Arc<dyn DataSource>,
    transaction_factory: Option<Arc<dyn TransactionFactory>>,
}

impl Environment {
    #[must_use]
    pub fn new(id: impl Into<String>, data_source: Arc<dyn DataSource>) -> Self {
        Self {
            id: id.into(),
            data_source,
            transaction_factory: None,
        }
    }

    #[must_use]
    pub fn with_transaction_factory(mut self, factory: Arc<dyn TransactionFactory>) -> Self {
        self.transaction_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }

    #[must_use]
    pub fn transaction_factory(&self) -> Option<&Arc<dyn TransactionFactory>> {
        self.transaction_factory.as_ref()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("transaction_factory", &self.transaction_factory.is_some())
            .finish_non_exhaustive()
    }
}
