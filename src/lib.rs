//! megalista_reader — warehouse row reader for measurement-protocol uploads.
//!
//! Given an [`Execution`](execution::Execution) whose source is a warehouse
//! table `D.T`, reads the rows of `D.T` that are not yet recorded in the
//! companion table `D.T_uploaded` and emits each one paired with the
//! execution, ready for a destination uploader.
//!
//! ```no_run
//! use std::sync::Arc;
//! use megalista_reader::reader::{MeasurementProtocolReader, Stage};
//! use megalista_reader::warehouse::postgres::PostgresFactory;
//! # fn run(execution: Arc<megalista_reader::execution::Execution>)
//! #     -> Result<(), megalista_reader::error::ReaderError> {
//! let reader = MeasurementProtocolReader::new(PostgresFactory::new("host=warehouse"));
//! for item in reader.process(execution)? {
//!     let item = item?;
//!     println!("{}", serde_json::Value::Object(item.row));
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod execution;
pub mod reader;
pub mod sql;
pub mod warehouse;
