use std::collections::VecDeque;
use std::sync::Arc;

use super::row::{ColumnIndex, CustomDbRow};
use crate::types::RowValues;

/// Fully read query result, drained front to back.
///
/// The `SQLite` driver reads every row inside its blocking task (a `rusqlite::Rows` borrows
/// the statement) and parks them here for the handle to hand out one at a time.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<ColumnIndex>,
    pending: VecDeque<CustomDbRow>,
    total: usize,
}

impl ResultSet {
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self {
            columns: Arc::new(ColumnIndex::new(column_names)),
            pending: VecDeque::new(),
            total: 0,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.labels()
    }

    pub fn push_values(&mut self, values: Vec<RowValues>) {
        self.pending
            .push_back(CustomDbRow::with_columns(Arc::clone(&self.columns), values));
        self.total += 1;
    }

    /// Take the next unread row.
    pub fn next_row(&mut self) -> Option<CustomDbRow> {
        self.pending.pop_front()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Rows read from the driver, consumed or not.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }
}
