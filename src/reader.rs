//! Measurement-protocol row reader.
//!
//! For an execution whose source is the warehouse table `D.T`, reads every
//! row of `D.T` whose `uuid` is not yet recorded in `D.T_uploaded` and pairs
//! it with the execution. The companion table is maintained by the uploader
//! further down the pipeline; this stage only reads.
//!
//! Each call to [`Stage::process`] connects a fresh client, runs exactly one
//! query and returns a lazy [`RowStream`]. Nothing is cached between calls,
//! and nothing is retried: connection and query failures are returned as-is.

use std::num::NonZeroU32;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ReaderConfig;
use crate::error::ReaderError;
use crate::execution::{Execution, SourceType};
use crate::sql::{self, TableRef};
use crate::warehouse::{Row, Rows, WarehouseFactory};

/// A unit of pipeline work: one input in, a sequence of outputs back.
///
/// Implementors are created once and invoked many times by an orchestrator,
/// possibly from several threads.
pub trait Stage: Send + Sync {
    type Input;
    type Output;
    type Outputs: Iterator<Item = Result<Self::Output, ReaderError>>;

    fn process(&self, input: Self::Input) -> Result<Self::Outputs, ReaderError>;
}

/// One emitted row together with the execution that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRow {
    pub execution: Arc<Execution>,
    pub row: Row,
}

/// Default rows fetched per warehouse round trip.
pub const DEFAULT_QUERY_BATCH_SIZE: NonZeroU32 = match NonZeroU32::new(20_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Reads not-yet-uploaded rows for measurement-protocol executions.
pub struct MeasurementProtocolReader<F> {
    factory: F,
    query_batch_size: NonZeroU32,
}

impl<F: WarehouseFactory> MeasurementProtocolReader<F> {
    pub fn new(factory: F) -> Self {
        MeasurementProtocolReader {
            factory,
            query_batch_size: DEFAULT_QUERY_BATCH_SIZE,
        }
    }

    pub fn from_config(factory: F, config: &ReaderConfig) -> Self {
        Self::new(factory).with_query_batch_size(config.query_batch_size)
    }

    /// Rows fetched per round trip. Does not affect which rows are emitted.
    pub fn with_query_batch_size(mut self, query_batch_size: NonZeroU32) -> Self {
        self.query_batch_size = query_batch_size;
        self
    }

    pub fn query_batch_size(&self) -> NonZeroU32 {
        self.query_batch_size
    }

    /// Read not-yet-uploaded rows for `execution`.
    pub fn read(&self, execution: Arc<Execution>) -> Result<RowStream, ReaderError> {
        let source = &execution.source;
        if source.source_type != SourceType::BigQuery {
            return Err(ReaderError::UnsupportedSourceType(source.source_type));
        }
        let (dataset, table) = source.dataset_and_table()?;
        let table = TableRef::new(dataset, table)?;

        let warehouse = self.factory.connect()?;
        let query = sql::not_uploaded_query(&table, warehouse.dialect());

        tracing::info!(
            target: "megalista_reader::measurement_protocol",
            table = %table,
            "Reading from table {table} for Execution ({execution})"
        );
        let rows = Rows::open(warehouse, &query, self.query_batch_size)?;

        Ok(RowStream { execution, rows })
    }
}

impl<F: WarehouseFactory> Stage for MeasurementProtocolReader<F> {
    type Input = Arc<Execution>;
    type Output = ExecutionRow;
    type Outputs = RowStream;

    fn process(&self, input: Arc<Execution>) -> Result<RowStream, ReaderError> {
        self.read(input)
    }
}

/// Lazy `(execution, row)` sequence in warehouse order.
///
/// Owns the warehouse client; dropping the stream releases it.
pub struct RowStream {
    execution: Arc<Execution>,
    rows: Rows,
}

impl RowStream {
    pub fn execution(&self) -> &Arc<Execution> {
        &self.execution
    }
}

impl Iterator for RowStream {
    type Item = Result<ExecutionRow, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(ExecutionRow {
            execution: Arc::clone(&self.execution),
            row: row.into_map(),
        }))
    }
}
