use std::time::Duration;

use async_trait::async_trait;

use crate::driver::Handle;
use crate::error::SqlMapperError;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

use super::manager::SharedSqliteConnection;
use super::params::convert_params;
use super::query::build_result_set;
use super::run_blocking;

/// Prepared statement on a [`SqliteConnection`](super::SqliteConnection).
///
/// The compiled statement lives in the connection's statement cache; the handle keeps the
/// bindings, the queued batch and the buffered rows of the last query.
///
/// A query reads all of its rows inside one blocking task, since `rusqlite::Rows` borrows the
/// statement and cannot outlive it. A [`Cursor`](crate::executor::Cursor) over this handle
/// therefore maps rows one at a time but holds the fetched rows in memory until it is closed.
///
/// The busy timeout is applied to the connection before every execution, so handles sharing
/// a connection each run with their own timeout.
pub struct SqliteHandle {
    conn: SharedSqliteConnection,
    sql: String,
    timeout: Option<Duration>,
    default_timeout: Option<Duration>,
    bindings: Vec<RowValues>,
    batch: Vec<Vec<RowValues>>,
    rows: Option<ResultSet>,
    columns: Vec<String>,
    closed: bool,
}

impl SqliteHandle {
    pub(crate) fn new(
        conn: SharedSqliteConnection,
        sql: String,
        timeout: Option<Duration>,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            conn,
            sql,
            timeout: timeout.or(default_timeout),
            default_timeout,
            bindings: Vec::new(),
            batch: Vec::new(),
            rows: None,
            columns: Vec::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ResourceClosed(format!(
                "statement handle is closed: {}",
                self.sql
            )));
        }
        Ok(())
    }
}

fn apply_timeout(
    conn: &rusqlite::Connection,
    timeout: Option<Duration>,
) -> Result<(), SqlMapperError> {
    if let Some(timeout) = timeout {
        conn.busy_timeout(timeout)?;
    }
    Ok(())
}

fn to_count(changed: usize) -> Result<u64, SqlMapperError> {
    u64::try_from(changed).map_err(|e| SqlMapperError::DriverError(format!("update count overflow: {e}")))
}

#[async_trait]
impl Handle for SqliteHandle {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, value: &RowValues) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        if index == 0 {
            return Err(SqlMapperError::ParameterError(
                "parameter indexes start at 1".into(),
            ));
        }
        if self.bindings.len() < index {
            self.bindings.resize(index, RowValues::Null);
        }
        self.bindings[index - 1] = value.clone();
        Ok(())
    }

    fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.or(self.default_timeout);
    }

    async fn execute_update(&mut self) -> Result<u64, SqlMapperError> {
        self.ensure_open()?;
        let sql = self.sql.clone();
        let timeout = self.timeout;
        let params = convert_params(&self.bindings);
        run_blocking(self.conn.clone(), move |conn| {
            apply_timeout(conn, timeout)?;
            let mut stmt = conn.prepare_cached(&sql)?;
            let changed = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
            to_count(changed)
        })
        .await
    }

    async fn execute_query(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        let sql = self.sql.clone();
        let timeout = self.timeout;
        let params = convert_params(&self.bindings);
        let result_set = run_blocking(self.conn.clone(), move |conn| {
            apply_timeout(conn, timeout)?;
            let mut stmt = conn.prepare_cached(&sql)?;
            build_result_set(&mut stmt, &params)
        })
        .await?;
        self.columns = result_set.column_names().to_vec();
        self.rows = Some(result_set);
        Ok(())
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlMapperError> {
        self.ensure_open()?;
        Ok(self.rows.as_mut().and_then(ResultSet::next_row))
    }

    fn add_batch(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.batch.push(self.bindings.clone());
        Ok(())
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>, SqlMapperError> {
        self.ensure_open()?;
        let sql = self.sql.clone();
        let timeout = self.timeout;
        let sets: Vec<_> = std::mem::take(&mut self.batch)
            .iter()
            .map(|set| convert_params(set))
            .collect();
        run_blocking(self.conn.clone(), move |conn| {
            apply_timeout(conn, timeout)?;
            let mut stmt = conn.prepare_cached(&sql)?;
            let mut counts = Vec::with_capacity(sets.len());
            for params in &sets {
                let changed = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
                counts.push(to_count(changed)?);
            }
            Ok(counts)
        })
        .await
    }

    async fn close(&mut self) -> Result<(), SqlMapperError> {
        self.closed = true;
        self.rows = None;
        self.batch.clear();
        self.bindings.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
