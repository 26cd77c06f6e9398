use std::future::Future;
use std::sync::Arc;

use bb8::ManageConnection;
use tokio::sync::Mutex;
use tracing::warn;

/// A `rusqlite` connection shared between its pooled owner and the handles it issued.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// bb8 manager opening `rusqlite` connections on one database file.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    wal: bool,
}

impl SqliteManager {
    #[must_use]
    pub fn new(db_path: String, wal: bool) -> Self {
        Self { db_path, wal }
    }
}

/// Open a standalone connection the same way the pool does.
///
/// # Errors
/// Returns the `rusqlite` error raised while opening or configuring the database.
pub fn open_connection(db_path: &str, wal: bool) -> Result<rusqlite::Connection, rusqlite::Error> {
    let conn = rusqlite::Connection::open(db_path)?;
    if wal {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    Ok(conn)
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let opened = open_connection(&self.db_path, self.wal).map(|conn| Arc::new(Mutex::new(conn)));
        async move { opened }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        // a connection still locked by a straggling handle is busy, not broken
        let checked = match conn.try_lock() {
            // a transaction left open by a dropped owner must not reach the next one
            Ok(guard) if !guard.is_autocommit() => {
                warn!("rolling back a transaction left open on a pooled sqlite connection");
                guard.execute_batch("ROLLBACK")
            }
            Ok(guard) => guard.execute_batch("SELECT 1"),
            Err(_) => Ok(()),
        };
        async move { checked }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
