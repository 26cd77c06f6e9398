use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::driver::{Connection, DataSource};
use crate::error::SqlMapperError;
use crate::types::IsolationLevel;

use super::{Transaction, TransactionFactory};

/// Transaction that commits and rolls back through the connection itself.
pub struct DriverTransaction {
    data_source: Option<Arc<dyn DataSource>>,
    connection: Option<Box<dyn Connection>>,
    level: Option<IsolationLevel>,
    auto_commit: bool,
    closed: bool,
}

impl DriverTransaction {
    #[must_use]
    pub fn new(
        data_source: Arc<dyn DataSource>,
        level: Option<IsolationLevel>,
        auto_commit: bool,
    ) -> Self {
        Self {
            data_source: Some(data_source),
            connection: None,
            level,
            auto_commit,
            closed: false,
        }
    }

    /// Wrap an open connection; its current auto-commit mode is left untouched.
    #[must_use]
    pub fn from_connection(connection: Box<dyn Connection>, auto_commit: bool) -> Self {
        Self {
            data_source: None,
            connection: Some(connection),
            level: None,
            auto_commit,
            closed: false,
        }
    }

    async fn open_connection(&mut self) -> Result<(), SqlMapperError> {
        let data_source = self.data_source.as_ref().ok_or_else(|| {
            SqlMapperError::ConnectionError("transaction has no data source".into())
        })?;
        debug!("opening driver connection");
        let mut connection = data_source.get_connection().await?;
        if let Some(level) = self.level {
            connection.set_isolation(level).await?;
        }
        if connection.auto_commit().await? != self.auto_commit {
            debug!(auto_commit = self.auto_commit, "setting auto-commit on connection");
            connection.set_auto_commit(self.auto_commit).await?;
        }
        self.connection = Some(connection);
        Ok(())
    }
}

#[async_trait]
impl Transaction for DriverTransaction {
    async fn connection(&mut self) -> Result<&mut Box<dyn Connection>, SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ResourceClosed("transaction is closed".into()));
        }
        if self.connection.is_none() {
            self.open_connection().await?;
        }
        self.connection
            .as_mut()
            .ok_or_else(|| SqlMapperError::ConnectionError("connection was not opened".into()))
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        if let Some(connection) = self.connection.as_mut()
            && !connection.auto_commit().await?
        {
            debug!("committing driver connection");
            connection.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        if let Some(connection) = self.connection.as_mut()
            && !connection.auto_commit().await?
        {
            debug!("rolling back driver connection");
            connection.rollback().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SqlMapperError> {
        self.closed = true;
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        // pooled connections are expected back in auto-commit mode
        match connection.auto_commit().await {
            Ok(false) => {
                if let Err(err) = connection.set_auto_commit(true).await {
                    warn!(error = %err, "failed to reset auto-commit before closing connection");
                }
            }
            Ok(true) => {}
            Err(err) => warn!(error = %err, "failed to read auto-commit before closing connection"),
        }
        debug!("closing driver connection");
        connection.close().await
    }
}

/// Factory for [`DriverTransaction`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverTransactionFactory;

impl TransactionFactory for DriverTransactionFactory {
    fn new_transaction(
        &self,
        data_source: Arc<dyn DataSource>,
        level: Option<IsolationLevel>,
        auto_commit: bool,
    ) -> Result<Box<dyn Transaction>, SqlMapperError> {
        Ok(Box::new(DriverTransaction::new(
            data_source,
            level,
            auto_commit,
        )))
    }

    fn from_connection(&self, connection: Box<dyn Connection>) -> Box<dyn Transaction> {
        // commit/rollback probe the connection, the flag only matters for lazy opens
        Box::new(DriverTransaction::from_connection(connection, true))
    }
}
