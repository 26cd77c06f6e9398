use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::driver::{Connection, DataSource};
use crate::error::SqlMapperError;
use crate::types::IsolationLevel;

use super::{Transaction, TransactionFactory};

/// Transaction whose commit and rollback are left to an outer coordinator.
///
/// Commit and rollback are no-ops. The connection is closed on [`close`](Transaction::close)
/// unless the factory was told otherwise.
pub struct ManagedTransaction {
    data_source: Option<Arc<dyn DataSource>>,
    connection: Option<Box<dyn Connection>>,
    level: Option<IsolationLevel>,
    close_connection: bool,
    closed: bool,
}

impl ManagedTransaction {
    #[must_use]
    pub fn new(
        data_source: Arc<dyn DataSource>,
        level: Option<IsolationLevel>,
        close_connection: bool,
    ) -> Self {
        Self {
            data_source: Some(data_source),
            connection: None,
            level,
            close_connection,
            closed: false,
        }
    }

    #[must_use]
    pub fn from_connection(connection: Box<dyn Connection>, close_connection: bool) -> Self {
        Self {
            data_source: None,
            connection: Some(connection),
            level: None,
            close_connection,
            closed: false,
        }
    }
}

#[async_trait]
impl Transaction for ManagedTransaction {
    async fn connection(&mut self) -> Result<&mut Box<dyn Connection>, SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ResourceClosed("transaction is closed".into()));
        }
        if self.connection.is_none() {
            let data_source = self.data_source.as_ref().ok_or_else(|| {
                SqlMapperError::ConnectionError("transaction has no data source".into())
            })?;
            debug!("opening managed connection");
            let mut connection = data_source.get_connection().await?;
            if let Some(level) = self.level {
                connection.set_isolation(level).await?;
            }
            self.connection = Some(connection);
        }
        self.connection
            .as_mut()
            .ok_or_else(|| SqlMapperError::ConnectionError("connection was not opened".into()))
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SqlMapperError> {
        self.closed = true;
        if self.close_connection
            && let Some(mut connection) = self.connection.take()
        {
            debug!("closing managed connection");
            connection.close().await?;
        }
        Ok(())
    }
}

/// Factory for [`ManagedTransaction`]; the session factory's default.
#[derive(Debug, Clone, Copy)]
pub struct ManagedTransactionFactory {
    close_connection: bool,
}

impl Default for ManagedTransactionFactory {
    fn default() -> Self {
        Self {
            close_connection: true,
        }
    }
}

impl ManagedTransactionFactory {
    #[must_use]
    pub fn new(close_connection: bool) -> Self {
        Self { close_connection }
    }
}

impl TransactionFactory for ManagedTransactionFactory {
    fn new_transaction(
        &self,
        data_source: Arc<dyn DataSource>,
        level: Option<IsolationLevel>,
        _auto_commit: bool,
    ) -> Result<Box<dyn Transaction>, SqlMapperError> {
        Ok(Box::new(ManagedTransaction::new(
            data_source,
            level,
            self.close_connection,
        )))
    }

    fn from_connection(&self, connection: Box<dyn Connection>) -> Box<dyn Transaction> {
        Box::new(ManagedTransaction::from_connection(
            connection,
            self.close_connection,
        ))
    }
}
