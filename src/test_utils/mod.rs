//! In-memory driver with fault injection, for tests.
//!
//! [`MockDataSource`] records every driver call in shared [`MockStats`] and can be told to fail
//! executes, handle closes, connection checkouts or the auto-commit probe. Queries answer with
//! canned rows registered per SQL fragment.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{Connection, DataSource, Handle};
use crate::error::SqlMapperError;
use crate::results::CustomDbRow;
use crate::types::{IsolationLevel, RowValues};

#[derive(Debug, Clone)]
struct CannedRows {
    columns: Arc<Vec<String>>,
    rows: Vec<Vec<RowValues>>,
}

#[derive(Debug, Default)]
struct Faults {
    execute: Vec<String>,
    close: bool,
    auto_commit_probe: bool,
    connect: bool,
}

/// Snapshot of the calls a [`MockDataSource`] has seen.
#[derive(Debug, Clone, Default)]
pub struct MockStats {
    pub connections_opened: usize,
    pub connections_closed: usize,
    /// SQL of every prepared handle, in order; the index is the handle id.
    pub prepared: Vec<String>,
    /// Close calls per handle id.
    pub handle_closes: Vec<usize>,
    /// SQL and bindings of every execution that reached the driver.
    pub executed: Vec<(String, Vec<RowValues>)>,
    pub rows_fetched: usize,
    pub commits: usize,
    pub rollbacks: usize,
    /// Timeout passed to each prepare, by handle id.
    pub timeouts: Vec<Option<Duration>>,
    /// Timeout of the handle at each execution, parallel to `executed`.
    pub execution_timeouts: Vec<Option<Duration>>,
    pub isolation: Option<IsolationLevel>,
}

impl MockStats {
    /// Handles prepared but never closed.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.handle_closes.iter().filter(|closes| **closes == 0).count()
    }

    /// Number of prepares whose SQL contains `fragment`.
    #[must_use]
    pub fn prepares_of(&self, fragment: &str) -> usize {
        self.prepared.iter().filter(|sql| sql.contains(fragment)).count()
    }

    /// Number of executions whose SQL contains `fragment`.
    #[must_use]
    pub fn executions_of(&self, fragment: &str) -> usize {
        self.executed
            .iter()
            .filter(|(sql, _)| sql.contains(fragment))
            .count()
    }
}

#[derive(Debug, Default)]
struct MockState {
    stats: MockStats,
    faults: Faults,
    canned: Vec<(String, CannedRows)>,
    update_count: u64,
}

impl MockState {
    fn fails(&self, sql: &str) -> bool {
        self.faults.execute.iter().any(|fragment| sql.contains(fragment.as_str()))
    }

    fn rows_for(&self, sql: &str) -> Option<CannedRows> {
        self.canned
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, canned)| canned.clone())
    }
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> std::sync::MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Data source handing out [`MockConnection`]s that share one call log.
#[derive(Debug, Clone)]
pub struct MockDataSource {
    state: SharedState,
}

impl Default for MockDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDataSource {
    #[must_use]
    pub fn new() -> Self {
        let state = MockState {
            update_count: 1,
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Answer queries whose SQL contains `fragment` with `rows`.
    #[must_use]
    pub fn with_rows(self, fragment: &str, columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let canned = CannedRows {
            columns: Arc::new(columns.iter().map(ToString::to_string).collect()),
            rows,
        };
        lock(&self.state).canned.push((fragment.to_string(), canned));
        self
    }

    /// Fail every execution whose SQL contains `fragment`.
    #[must_use]
    pub fn fail_execute(self, fragment: &str) -> Self {
        lock(&self.state).faults.execute.push(fragment.to_string());
        self
    }

    /// Fail every handle close.
    #[must_use]
    pub fn fail_close(self) -> Self {
        lock(&self.state).faults.close = true;
        self
    }

    /// Make `Connection::auto_commit` fail.
    #[must_use]
    pub fn fail_auto_commit_probe(self) -> Self {
        lock(&self.state).faults.auto_commit_probe = true;
        self
    }

    /// Refuse every connection checkout.
    #[must_use]
    pub fn fail_connect(self) -> Self {
        lock(&self.state).faults.connect = true;
        self
    }

    /// Affected-row count reported by updates and by each batched parameter set.
    #[must_use]
    pub fn update_count(self, count: u64) -> Self {
        lock(&self.state).update_count = count;
        self
    }

    #[must_use]
    pub fn stats(&self) -> MockStats {
        lock(&self.state).stats.clone()
    }

    /// A connection outside any pool, for sessions opened over a caller's connection.
    #[must_use]
    pub fn connection(&self) -> MockConnection {
        lock(&self.state).stats.connections_opened += 1;
        MockConnection::new(Arc::clone(&self.state))
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn get_connection(&self) -> Result<Box<dyn Connection>, SqlMapperError> {
        if lock(&self.state).faults.connect {
            return Err(SqlMapperError::ConnectionError("mock refuses connections".into()));
        }
        Ok(Box::new(self.connection()))
    }
}

/// Connection of a [`MockDataSource`].
#[derive(Debug)]
pub struct MockConnection {
    state: SharedState,
    auto_commit: bool,
    closed: bool,
}

impl MockConnection {
    fn new(state: SharedState) -> Self {
        Self {
            state,
            auto_commit: true,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ResourceClosed("mock connection is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn prepare(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Handle>, SqlMapperError> {
        self.ensure_open()?;
        let id = {
            let mut state = lock(&self.state);
            state.stats.prepared.push(sql.to_string());
            state.stats.handle_closes.push(0);
            state.stats.timeouts.push(timeout);
            state.stats.prepared.len() - 1
        };
        Ok(Box::new(MockHandle {
            id,
            sql: sql.to_string(),
            state: Arc::clone(&self.state),
            bindings: Vec::new(),
            batch: Vec::new(),
            columns: Arc::new(Vec::new()),
            rows: VecDeque::new(),
            timeout,
            closed: false,
        }))
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.auto_commit = auto_commit;
        Ok(())
    }

    async fn auto_commit(&mut self) -> Result<bool, SqlMapperError> {
        if lock(&self.state).faults.auto_commit_probe {
            return Err(SqlMapperError::DriverError("auto-commit probe failed".into()));
        }
        Ok(self.auto_commit)
    }

    async fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        lock(&self.state).stats.isolation = Some(level);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        lock(&self.state).stats.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        lock(&self.state).stats.rollbacks += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SqlMapperError> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).stats.connections_closed += 1;
        }
        Ok(())
    }
}

/// Statement handle of a [`MockConnection`].
#[derive(Debug)]
pub struct MockHandle {
    id: usize,
    sql: String,
    state: SharedState,
    bindings: Vec<RowValues>,
    batch: Vec<Vec<RowValues>>,
    columns: Arc<Vec<String>>,
    rows: VecDeque<Vec<RowValues>>,
    timeout: Option<Duration>,
    closed: bool,
}

impl MockHandle {
    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.closed {
            return Err(SqlMapperError::ResourceClosed(format!(
                "mock handle {} is closed",
                self.id
            )));
        }
        Ok(())
    }

    fn record(&self, bindings: Vec<RowValues>) -> Result<(), SqlMapperError> {
        let mut state = lock(&self.state);
        if state.fails(&self.sql) {
            return Err(SqlMapperError::DriverError(format!(
                "injected failure executing: {}",
                self.sql
            )));
        }
        state.stats.executed.push((self.sql.clone(), bindings));
        state.stats.execution_timeouts.push(self.timeout);
        Ok(())
    }
}

#[async_trait]
impl Handle for MockHandle {
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
        self.timeout = timeout;
    }

    async fn execute_update(&mut self) -> Result<u64, SqlMapperError> {
        self.ensure_open()?;
        self.record(self.bindings.clone())?;
        Ok(lock(&self.state).update_count)
    }

    async fn execute_query(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.record(self.bindings.clone())?;
        let canned = lock(&self.state).rows_for(&self.sql);
        if let Some(canned) = canned {
            self.columns = canned.columns;
            self.rows = canned.rows.into();
        } else {
            self.columns = Arc::new(Vec::new());
            self.rows.clear();
        }
        Ok(())
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlMapperError> {
        self.ensure_open()?;
        let Some(values) = self.rows.pop_front() else {
            return Ok(None);
        };
        lock(&self.state).stats.rows_fetched += 1;
        Ok(Some(CustomDbRow::new(Arc::clone(&self.columns), values)))
    }

    fn add_batch(&mut self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.batch.push(self.bindings.clone());
        Ok(())
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>, SqlMapperError> {
        self.ensure_open()?;
        let sets = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(sets.len());
        for set in sets {
            self.record(set)?;
            counts.push(lock(&self.state).update_count);
        }
        Ok(counts)
    }

    async fn close(&mut self) -> Result<(), SqlMapperError> {
        let mut state = lock(&self.state);
        if let Some(closes) = state.stats.handle_closes.get_mut(self.id) {
            *closes += 1;
        }
        self.closed = true;
        if state.faults.close {
            return Err(SqlMapperError::DriverError(format!(
                "injected failure closing handle {}",
                self.id
            )));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Execution counts keyed by SQL text.
#[must_use]
pub fn count_by_sql(stats: &MockStats) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for (sql, _) in &stats.executed {
        *counts.entry(sql.clone()).or_insert(0) += 1;
    }
    counts
}
