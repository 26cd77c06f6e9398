// SQLite backend for the driver seam.
//
// - config: pool options and builder
// - manager: bb8 connection manager
// - data_source / connection / handle: the driver trait implementations
// - params / query: value conversion and result extraction

pub mod config;
pub mod connection;
pub mod data_source;
pub mod handle;
pub mod manager;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use data_source::SqliteDataSource;
pub use handle::SqliteHandle;
pub use manager::{SharedSqliteConnection, SqliteManager};
pub use query::build_result_set;

use crate::error::SqlMapperError;

/// Run `func` against the connection on the blocking pool.
///
/// # Errors
/// Returns the closure's error, or `SqlMapperError::ConnectionError` if the blocking task fails.
pub async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, SqlMapperError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlMapperError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlMapperError::ConnectionError(format!("sqlite spawn_blocking join error: {e}")))?
}
