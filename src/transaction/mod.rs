//! Transactions: the exclusive owner of a session's connection.

pub mod driver;
pub mod managed;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{Connection, DataSource};
use crate::error::SqlMapperError;
use crate::types::IsolationLevel;

pub use driver::{DriverTransaction, DriverTransactionFactory};
pub use managed::{ManagedTransaction, ManagedTransactionFactory};

#[async_trait]
pub trait Transaction: Send {
    /// The connection, opened on first use.
    async fn connection(&mut self) -> Result<&mut Box<dyn Connection>, SqlMapperError>;

    async fn commit(&mut self) -> Result<(), SqlMapperError>;

    async fn rollback(&mut self) -> Result<(), SqlMapperError>;

    async fn close(&mut self) -> Result<(), SqlMapperError>;

    /// Statement timeout imposed by the transaction, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Creates transactions for the session factory.
pub trait TransactionFactory: Send + Sync {
    /// A transaction that lazily acquires its connection from `data_source`.
    ///
    /// # Errors
    /// Implementations may refuse the requested settings.
    fn new_transaction(
        &self,
        data_source: Arc<dyn DataSource>,
        level: Option<IsolationLevel>,
        auto_commit: bool,
    ) -> Result<Box<dyn Transaction>, SqlMapperError>;

    /// A transaction over a connection the caller already holds.
    fn from_connection(&self, connection: Box<dyn Connection>) -> Box<dyn Transaction>;
}
