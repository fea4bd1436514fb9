//! In-memory warehouse returning canned rows.
//!
//! Every query gets the same rows back, paged by the requested page size.
//! Connections, queries and page fetches are recorded in a shared
//! [`QueryLog`] so callers can assert what was (or was not) issued.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ReaderError;
use crate::sql::Dialect;

use super::{PageCursor, Warehouse, WarehouseFactory, WarehouseRow};

/// What a [`MemoryWarehouse`] has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryLog {
    pub connects: usize,
    /// `(sql, page_size)` per query, in order.
    pub queries: Vec<(String, u32)>,
    /// Pages handed out, including empty ones but not the end marker.
    pub pages: usize,
}

#[derive(Debug, Clone)]
enum Failure {
    Connect(String),
    Query(String),
    Page { index: usize, message: String },
}

/// Canned-row warehouse; also its own factory.
#[derive(Debug, Clone)]
pub struct MemoryWarehouse {
    rows: Arc<Vec<WarehouseRow>>,
    dialect: Dialect,
    failure: Option<Failure>,
    log: Arc<Mutex<QueryLog>>,
}

impl MemoryWarehouse {
    pub fn new(rows: Vec<WarehouseRow>) -> Self {
        MemoryWarehouse {
            rows: Arc::new(rows),
            dialect: Dialect::BigQuery,
            failure: None,
            log: Arc::new(Mutex::new(QueryLog::default())),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Fail every `connect()`.
    pub fn failing_connect(mut self, message: &str) -> Self {
        self.failure = Some(Failure::Connect(message.to_string()));
        self
    }

    /// Fail every `query()`.
    pub fn failing_query(mut self, message: &str) -> Self {
        self.failure = Some(Failure::Query(message.to_string()));
        self
    }

    /// Fail when page `index` (0-based) is requested.
    pub fn failing_on_page(mut self, index: usize, message: &str) -> Self {
        self.failure = Some(Failure::Page {
            index,
            message: message.to_string(),
        });
        self
    }

    /// Snapshot of everything recorded so far.
    pub fn log(&self) -> QueryLog {
        lock(&self.log).clone()
    }
}

fn lock(log: &Mutex<QueryLog>) -> MutexGuard<'_, QueryLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WarehouseFactory for MemoryWarehouse {
    fn connect(&self) -> Result<Box<dyn Warehouse>, ReaderError> {
        lock(&self.log).connects += 1;
        if let Some(Failure::Connect(message)) = &self.failure {
            return Err(ReaderError::warehouse(message.clone()));
        }
        Ok(Box::new(self.clone()))
    }
}

impl Warehouse for MemoryWarehouse {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query(
        self: Box<Self>,
        sql: &str,
        page_size: NonZeroU32,
    ) -> Result<Box<dyn PageCursor>, ReaderError> {
        lock(&self.log)
            .queries
            .push((sql.to_string(), page_size.get()));
        if let Some(Failure::Query(message)) = &self.failure {
            return Err(ReaderError::warehouse(message.clone()));
        }
        let page_failure = match &self.failure {
            Some(Failure::Page { index, message }) => Some((*index, message.clone())),
            _ => None,
        };
        Ok(Box::new(MemoryCursor {
            rows: Arc::clone(&self.rows),
            offset: 0,
            page_size: page_size.get() as usize,
            page_index: 0,
            page_failure,
            log: Arc::clone(&self.log),
        }))
    }
}

struct MemoryCursor {
    rows: Arc<Vec<WarehouseRow>>,
    offset: usize,
    page_size: usize,
    page_index: usize,
    page_failure: Option<(usize, String)>,
    log: Arc<Mutex<QueryLog>>,
}

impl PageCursor for MemoryCursor {
    fn next_page(&mut self) -> Result<Option<Vec<WarehouseRow>>, ReaderError> {
        if let Some((index, message)) = &self.page_failure {
            if *index == self.page_index {
                return Err(ReaderError::warehouse(message.clone()));
            }
        }
        if self.offset >= self.rows.len() {
            return Ok(None);
        }
        let end = (self.offset + self.page_size).min(self.rows.len());
        let page = self.rows[self.offset..end].to_vec();
        self.offset = end;
        self.page_index += 1;
        lock(&self.log).pages += 1;
        Ok(Some(page))
    }
}
