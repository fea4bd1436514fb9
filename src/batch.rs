//! Routing and batching of emitted rows.
//!
//! Uploaders accept rows in batches whose size depends on the destination
//! API. [`Batches`] groups a row stream into [`Batch`]es of at most `size`
//! rows; a batch never mixes rows of different executions.

use std::sync::Arc;

use serde::Serialize;

use crate::error::ReaderError;
use crate::execution::{DestinationType, Execution};
use crate::reader::ExecutionRow;
use crate::warehouse::Row;

/// Batch size used for destinations without a specific limit.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Default number of rows per upload call for `destination`.
pub fn default_batch_size(destination: DestinationType) -> usize {
    match destination {
        DestinationType::GaMeasurementProtocol | DestinationType::Ga4MeasurementProtocol => 20,
        DestinationType::AdsSsdUpload => 50,
        DestinationType::CmOfflineConversion | DestinationType::AppsflyerS2sEvents => 1000,
        DestinationType::GaDataImport => 1_000_000,
        DestinationType::GaUserListUpload => 5_000_000,
        _ => DEFAULT_BATCH_SIZE,
    }
}

/// Keep executions whose destination is `destination`.
pub fn filter_by_destination<'a, I>(
    executions: I,
    destination: DestinationType,
) -> impl Iterator<Item = &'a Arc<Execution>>
where
    I: IntoIterator<Item = &'a Arc<Execution>>,
{
    executions
        .into_iter()
        .filter(move |e| e.destination.destination_type == destination)
}

/// Rows of one execution handed to an uploader together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub execution: Arc<Execution>,
    pub rows: Vec<Row>,
}

/// Groups consecutive rows of the same execution into batches.
///
/// An error from the input is yielded after the rows collected before it,
/// and ends the batching.
pub struct Batches<I> {
    inner: I,
    size: usize,
    pending: Option<Batch>,
    error: Option<ReaderError>,
    done: bool,
}

impl<I> Batches<I>
where
    I: Iterator<Item = Result<ExecutionRow, ReaderError>>,
{
    /// `size` is clamped to at least one row.
    pub fn new(inner: I, size: usize) -> Self {
        Batches {
            inner,
            size: size.max(1),
            pending: None,
            error: None,
            done: false,
        }
    }
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<ExecutionRow, ReaderError>>,
{
    type Item = Result<Batch, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.error.take() {
            return Some(Err(err));
        }
        if self
            .pending
            .as_ref()
            .is_some_and(|b| b.rows.len() >= self.size)
        {
            return self.pending.take().map(Ok);
        }
        while !self.done {
            match self.inner.next() {
                None => self.done = true,
                Some(Err(err)) => {
                    self.done = true;
                    match self.pending.take() {
                        Some(batch) => {
                            self.error = Some(err);
                            return Some(Ok(batch));
                        }
                        None => return Some(Err(err)),
                    }
                }
                Some(Ok(ExecutionRow { execution, row })) => {
                    let flush = match &self.pending {
                        Some(batch) => !Arc::ptr_eq(&batch.execution, &execution),
                        None => false,
                    };
                    let flushed = if flush { self.pending.take() } else { None };

                    let batch = self.pending.get_or_insert_with(|| Batch {
                        execution,
                        rows: Vec::new(),
                    });
                    batch.rows.push(row);

                    if let Some(full) = flushed {
                        return Some(Ok(full));
                    }
                    if batch.rows.len() >= self.size {
                        return self.pending.take().map(Ok);
                    }
                }
            }
        }
        self.pending.take().map(Ok)
    }
}

/// Extension for batching any row stream.
pub trait BatchExt: Iterator<Item = Result<ExecutionRow, ReaderError>> + Sized {
    fn batches(self, size: usize) -> Batches<Self> {
        Batches::new(self, size)
    }
}

impl<I> BatchExt for I where I: Iterator<Item = Result<ExecutionRow, ReaderError>> {}
