use std::sync::Arc;

use tracing::{debug, warn};

use crate::driver::Connection;
use crate::error::SqlMapperError;
use crate::transaction::{ManagedTransactionFactory, Transaction, TransactionFactory};
use crate::types::{ExecutorType, IsolationLevel};

use super::configuration::Configuration;
use super::sql_session::SqlSession;

/// Opens sessions over one [`Configuration`].
#[derive(Debug, Clone)]
pub struct SqlSessionFactory {
    configuration: Arc<Configuration>,
}

impl SqlSessionFactory {
    #[must_use]
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self { configuration }
    }

    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Session with the configured default executor, manual commit and the driver's isolation.
    ///
    /// # Errors
    /// Returns `SqlMapperError::OpenSession` wrapping the cause.
    pub async fn open_session(&self) -> Result<SqlSession, SqlMapperError> {
        let executor_type = self.configuration.settings().default_executor_type;
        self.open_session_with(executor_type, None, false).await
    }

    /// Session over a connection from the environment's data source.
    ///
    /// # Errors
    /// Returns `SqlMapperError::OpenSession` wrapping the cause; a transaction created before
    /// the failure is closed first.
    pub async fn open_session_with(
        &self,
        executor_type: ExecutorType,
        level: Option<IsolationLevel>,
        auto_commit: bool,
    ) -> Result<SqlSession, SqlMapperError> {
        let environment = self.configuration.environment().ok_or_else(|| {
            SqlMapperError::open_session(SqlMapperError::ConfigError(
                "no environment is configured".into(),
            ))
        })?;
        let transaction = self
            .transaction_factory()
            .new_transaction(Arc::clone(environment.data_source()), level, auto_commit)
            .map_err(SqlMapperError::open_session)?;
        self.finish(transaction, executor_type, auto_commit).await
    }

    /// Session over a connection the caller already holds.
    ///
    /// Auto-commit is read from the connection; a driver that cannot report it is treated as
    /// auto-committing.
    ///
    /// # Errors
    /// Returns `SqlMapperError::OpenSession` wrapping the cause.
    pub async fn open_session_from_connection(
        &self,
        mut connection: Box<dyn Connection>,
        executor_type: ExecutorType,
    ) -> Result<SqlSession, SqlMapperError> {
        let auto_commit = match connection.auto_commit().await {
            Ok(auto_commit) => auto_commit,
            Err(err) => {
                debug!(error = %err, "driver does not report auto-commit, assuming true");
                true
            }
        };
        let transaction = self.transaction_factory().from_connection(connection);
        self.finish(transaction, executor_type, auto_commit).await
    }

    fn transaction_factory(&self) -> Arc<dyn TransactionFactory> {
        self.configuration
            .environment()
            .and_then(|environment| environment.transaction_factory().cloned())
            .unwrap_or_else(|| Arc::new(ManagedTransactionFactory::default()))
    }

    async fn finish(
        &self,
        mut transaction: Box<dyn Transaction>,
        executor_type: ExecutorType,
        auto_commit: bool,
    ) -> Result<SqlSession, SqlMapperError> {
        let chain = match self.configuration.interceptor_chain().resolve() {
            Ok(chain) => chain,
            Err(err) => {
                if let Err(close_err) = transaction.close().await {
                    warn!(error = %close_err, "failed to close transaction of a failed session");
                }
                return Err(SqlMapperError::open_session(err));
            }
        };
        let executor = self
            .configuration
            .new_executor(transaction, executor_type, &chain);
        debug!(?executor_type, auto_commit, "opened session");
        Ok(SqlSession::new(
            Arc::clone(&self.configuration),
            executor,
            auto_commit,
        ))
    }
}
