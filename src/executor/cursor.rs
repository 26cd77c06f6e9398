use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::driver::Handle;
use crate::error::SqlMapperError;
use crate::reflection::Object;
use crate::types::RowBounds;

use super::result_handler::RowMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorStatus {
    Open,
    Consumed,
    Closed,
}

pub(crate) struct CursorState {
    statement_id: String,
    handle: Option<Box<dyn Handle>>,
    mapper: RowMapper,
    bounds: RowBounds,
    offset_applied: bool,
    fetched: usize,
    status: CursorStatus,
}

impl CursorState {
    async fn fetch_next(&mut self) -> Result<Option<Object>, SqlMapperError> {
        match self.status {
            CursorStatus::Closed => {
                return Err(SqlMapperError::ResourceClosed(format!(
                    "cursor for '{}' is closed",
                    self.statement_id
                )));
            }
            CursorStatus::Consumed => return Ok(None),
            CursorStatus::Open => {}
        }
        if self.fetched >= self.bounds.limit {
            self.finish().await?;
            return Ok(None);
        }
        match self.read_row().await {
            Ok(Some(object)) => {
                self.fetched += 1;
                Ok(Some(object))
            }
            Ok(None) => {
                self.finish().await?;
                Ok(None)
            }
            Err(err) => {
                self.release(CursorStatus::Closed).await;
                Err(err)
            }
        }
    }

    async fn read_row(&mut self) -> Result<Option<Object>, SqlMapperError> {
        let handle = self.handle.as_mut().ok_or_else(|| {
            SqlMapperError::ResourceClosed(format!("cursor for '{}' has no handle", self.statement_id))
        })?;
        if !self.offset_applied {
            self.offset_applied = true;
            for _ in 0..self.bounds.offset {
                if handle.next_row().await?.is_none() {
                    return Ok(None);
                }
            }
        }
        match handle.next_row().await? {
            Some(row) => self.mapper.map_row(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Exhausted: release the handle and surface a close failure.
    async fn finish(&mut self) -> Result<(), SqlMapperError> {
        self.status = CursorStatus::Consumed;
        if let Some(mut handle) = self.handle.take() {
            debug!(statement = %self.statement_id, fetched = self.fetched, "cursor consumed");
            handle.close().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SqlMapperError> {
        self.status = CursorStatus::Closed;
        if let Some(mut handle) = self.handle.take() {
            handle.close().await?;
        }
        Ok(())
    }

    // error path: a close failure must not hide the original error
    async fn release(&mut self, status: CursorStatus) {
        self.status = status;
        if let Some(mut handle) = self.handle.take()
            && let Err(err) = handle.close().await
        {
            warn!(statement = %self.statement_id, error = %err, "failed to close cursor handle");
        }
    }
}

/// Lazily mapped query result.
///
/// The cursor owns its statement handle and releases it when the last row has been read, when
/// [`close`](Cursor::close) is called, or when the session that produced it closes. Reading
/// from a closed cursor fails with `SqlMapperError::ResourceClosed`.
pub struct Cursor {
    state: Arc<Mutex<CursorState>>,
}

impl Cursor {
    pub(crate) fn new(
        statement_id: impl Into<String>,
        handle: Box<dyn Handle>,
        mapper: RowMapper,
        bounds: RowBounds,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CursorState {
                statement_id: statement_id.into(),
                handle: Some(handle),
                mapper,
                bounds,
                offset_applied: false,
                fetched: 0,
                status: CursorStatus::Open,
            })),
        }
    }

    /// Fetch and map the next row, `None` once the result is exhausted.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ResourceClosed` after the cursor or its session was closed, or
    /// the driver/mapping error; the handle is released on any error.
    pub async fn fetch_next(&mut self) -> Result<Option<Object>, SqlMapperError> {
        self.state.lock().await.fetch_next().await
    }

    /// Drain the cursor.
    ///
    /// # Errors
    /// See [`fetch_next`](Cursor::fetch_next).
    pub async fn fetch_all(&mut self) -> Result<Vec<Object>, SqlMapperError> {
        let mut state = self.state.lock().await;
        let mut out = Vec::new();
        while let Some(object) = state.fetch_next().await? {
            out.push(object);
        }
        Ok(out)
    }

    /// Release the handle; later reads fail with `ResourceClosed`.
    ///
    /// # Errors
    /// Returns the driver error raised while closing the handle.
    pub async fn close(&mut self) -> Result<(), SqlMapperError> {
        self.state.lock().await.close().await
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.status == CursorStatus::Open
    }

    pub async fn is_consumed(&self) -> bool {
        self.state.lock().await.status == CursorStatus::Consumed
    }

    /// Rows returned so far.
    pub async fn fetched(&self) -> usize {
        self.state.lock().await.fetched
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<CursorState>> {
        Arc::downgrade(&self.state)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").finish_non_exhaustive()
    }
}

/// Close a cursor through its registration; dropped cursors are skipped.
pub(crate) async fn close_registered(cursor: &Weak<Mutex<CursorState>>) {
    if let Some(state) = cursor.upgrade() {
        let mut state = state.lock().await;
        if state.status != CursorStatus::Closed {
            state.release(CursorStatus::Closed).await;
        }
    }
}
