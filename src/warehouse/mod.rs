//! Warehouse client capability and result pagination.
//!
//! The reader never talks to a concrete client. It asks a [`WarehouseFactory`]
//! for a fresh [`Warehouse`] per invocation, hands it the query, and drains the
//! returned [`PageCursor`] page by page through [`Rows`]. The client is moved
//! into the cursor, so it lives exactly as long as the result stream.
//!
//! - [`postgres`] — production client over the synchronous `postgres` crate.
//! - [`memory`] — canned rows for tests and dry runs.

pub mod memory;
pub mod postgres;

use std::num::NonZeroU32;

use serde_json::Value;

use crate::error::ReaderError;
use crate::sql::Dialect;

/// A converted row: column name → warehouse value.
pub type Row = serde_json::Map<String, Value>;

/// A result row as reported by a client: named fields in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WarehouseRow {
    fields: Vec<(String, Value)>,
}

impl WarehouseRow {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        WarehouseRow { fields }
    }

    /// Plain column → value mapping. Values are moved as-is.
    pub fn into_map(self) -> Row {
        self.fields.into_iter().collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for WarehouseRow {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        WarehouseRow::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Pages of a running query.
pub trait PageCursor: Send {
    /// Fetch the next page. `Ok(None)` marks the end of the result.
    fn next_page(&mut self) -> Result<Option<Vec<WarehouseRow>>, ReaderError>;
}

/// A connected warehouse client.
pub trait Warehouse: Send {
    /// Quoting rules for table paths sent to this client.
    fn dialect(&self) -> Dialect;

    /// Start `sql`, fetching `page_size` rows per round trip. The client is
    /// consumed by the returned cursor.
    fn query(
        self: Box<Self>,
        sql: &str,
        page_size: NonZeroU32,
    ) -> Result<Box<dyn PageCursor>, ReaderError>;
}

/// Creates one client per reader invocation.
pub trait WarehouseFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Warehouse>, ReaderError>;
}

impl<F> WarehouseFactory for F
where
    F: Fn() -> Result<Box<dyn Warehouse>, ReaderError> + Send + Sync,
{
    fn connect(&self) -> Result<Box<dyn Warehouse>, ReaderError> {
        self()
    }
}

/// Row-at-a-time view over a [`PageCursor`].
///
/// A fetch error is yielded once, after which the iterator is exhausted.
pub struct Rows {
    cursor: Box<dyn PageCursor>,
    page: std::vec::IntoIter<WarehouseRow>,
    pages_fetched: usize,
    done: bool,
}

impl Rows {
    /// Run `sql` and fetch its first page, so query errors surface here
    /// rather than from the first `next()`.
    pub fn open(
        warehouse: Box<dyn Warehouse>,
        sql: &str,
        page_size: NonZeroU32,
    ) -> Result<Self, ReaderError> {
        let mut cursor = warehouse.query(sql, page_size)?;
        let first = cursor.next_page()?;
        if let Some(rows) = &first {
            tracing::debug!(rows = rows.len(), page = 1, "fetched page");
        }
        let done = first.is_none();
        Ok(Rows {
            cursor,
            page: first.unwrap_or_default().into_iter(),
            pages_fetched: usize::from(!done),
            done,
        })
    }

    /// Pages fetched so far, not counting the end marker.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

impl Iterator for Rows {
    type Item = Result<WarehouseRow, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.page.next() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.cursor.next_page() {
                Ok(Some(rows)) => {
                    self.pages_fetched += 1;
                    tracing::debug!(rows = rows.len(), page = self.pages_fetched, "fetched page");
                    self.page = rows.into_iter();
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
