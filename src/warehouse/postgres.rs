//! PostgreSQL-backed warehouse client.
//!
//! Uses the synchronous `postgres` crate. A query runs inside a read-only
//! transaction as a server-side cursor, and each page is one
//! `FETCH FORWARD n`, so at most `page_size` rows are held client-side.
//!
//! Column values are mapped to JSON without coercion: integers and floats to
//! numbers, text to strings, `json`/`jsonb` as-is, `uuid` and temporal types
//! to their canonical string form, SQL `NULL` to `null`. Columns of any other
//! type (`numeric`, `bytea`, arrays, enums, ...) are read in PostgreSQL's own
//! text form, so a `numeric` keeps its exact decimal digits.

use std::num::NonZeroU32;

use postgres::types::Type;
use postgres::{Client, NoTls};
use serde_json::Value;

use crate::config::ReaderConfig;
use crate::error::ReaderError;
use crate::sql::{Dialect, quote_ident};

use super::{PageCursor, Warehouse, WarehouseFactory, WarehouseRow};

const CURSOR_NAME: &str = "megalista_rows";

/// Connects a [`PostgresWarehouse`] per invocation.
#[derive(Debug, Clone)]
pub struct PostgresFactory {
    connection: String,
    dialect: Dialect,
}

impl PostgresFactory {
    /// `connection` is a libpq-style string or `postgres://` URL.
    pub fn new(connection: impl Into<String>) -> Self {
        PostgresFactory {
            connection: connection.into(),
            dialect: Dialect::Postgres,
        }
    }

    /// Factory for the configured connection and dialect.
    pub fn from_config(config: &ReaderConfig) -> Result<Self, ReaderError> {
        let factory = Self::new(config.connection()?);
        Ok(match config.warehouse.dialect {
            Some(dialect) => factory.with_dialect(dialect),
            None => factory,
        })
    }

    /// Quoting reported by the connected clients.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl WarehouseFactory for PostgresFactory {
    fn connect(&self) -> Result<Box<dyn Warehouse>, ReaderError> {
        let mut warehouse = PostgresWarehouse::connect(&self.connection)?;
        warehouse.dialect = self.dialect;
        Ok(Box::new(warehouse))
    }
}

/// A single connection used for one query.
pub struct PostgresWarehouse {
    client: Client,
    dialect: Dialect,
}

impl PostgresWarehouse {
    pub fn connect(connection: &str) -> Result<Self, ReaderError> {
        let client = Client::connect(connection, NoTls)?;
        Ok(PostgresWarehouse {
            client,
            dialect: Dialect::Postgres,
        })
    }
}

impl Warehouse for PostgresWarehouse {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query(
        self: Box<Self>,
        sql: &str,
        page_size: NonZeroU32,
    ) -> Result<Box<dyn PageCursor>, ReaderError> {
        let mut client = self.client;
        client.batch_execute("BEGIN READ ONLY")?;
        let statement = client.prepare(sql)?;
        let cursor_sql = text_cast_query(
            sql,
            statement.columns().iter().map(|c| (c.name(), c.type_())),
        );
        client.batch_execute(&format!(
            "DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {cursor_sql}"
        ))?;
        Ok(Box::new(PostgresCursor {
            client,
            fetch: format!("FETCH FORWARD {page_size} FROM {CURSOR_NAME}"),
            open: true,
        }))
    }
}

struct PostgresCursor {
    client: Client,
    fetch: String,
    open: bool,
}

impl PageCursor for PostgresCursor {
    fn next_page(&mut self) -> Result<Option<Vec<WarehouseRow>>, ReaderError> {
        if !self.open {
            return Ok(None);
        }
        let rows = self.client.query(self.fetch.as_str(), &[])?;
        if rows.is_empty() {
            self.open = false;
            self.client
                .batch_execute(&format!("CLOSE {CURSOR_NAME}; COMMIT"))?;
            return Ok(None);
        }
        rows.iter().map(convert_row).collect::<Result<Vec<_>, _>>().map(Some)
    }
}

/// Types read through the binary protocol and mapped by [`column_value`].
fn has_json_mapping(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::OID
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::TEXT
            | Type::VARCHAR
            | Type::BPCHAR
            | Type::NAME
            | Type::JSON
            | Type::JSONB
            | Type::UUID
            | Type::TIMESTAMPTZ
            | Type::TIMESTAMP
            | Type::DATE
    )
}

/// Wrap `sql` so that every column without a JSON mapping comes back as
/// `text`. Returns `sql` unchanged when no column needs it.
fn text_cast_query<'a>(
    sql: &str,
    columns: impl IntoIterator<Item = (&'a str, &'a Type)>,
) -> String {
    let columns: Vec<(&str, &Type)> = columns.into_iter().collect();
    if columns.iter().all(|(_, ty)| has_json_mapping(ty)) {
        return sql.to_string();
    }
    let select = columns
        .iter()
        .map(|(name, ty)| {
            let col = quote_ident(name);
            if has_json_mapping(ty) {
                col
            } else {
                format!("{col}::text AS {col}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {select} FROM ({sql}) AS src")
}

fn convert_row(row: &postgres::Row) -> Result<WarehouseRow, ReaderError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| Ok((col.name().to_string(), column_value(row, idx, col.type_())?)))
        .collect::<Result<Vec<_>, ReaderError>>()
        .map(WarehouseRow::new)
}

fn nullable<T: Into<Value>>(v: Option<T>) -> Value {
    v.map_or(Value::Null, Into::into)
}

fn column_value(row: &postgres::Row, idx: usize, ty: &Type) -> Result<Value, ReaderError> {
    let value = match *ty {
        Type::BOOL => nullable(row.try_get::<_, Option<bool>>(idx)?),
        Type::INT2 => nullable(row.try_get::<_, Option<i16>>(idx)?),
        Type::INT4 => nullable(row.try_get::<_, Option<i32>>(idx)?),
        Type::INT8 => nullable(row.try_get::<_, Option<i64>>(idx)?),
        Type::OID => nullable(row.try_get::<_, Option<u32>>(idx)?),
        Type::FLOAT4 => nullable(row.try_get::<_, Option<f32>>(idx)?),
        Type::FLOAT8 => nullable(row.try_get::<_, Option<f64>>(idx)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            nullable(row.try_get::<_, Option<String>>(idx)?)
        }
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.unwrap_or(Value::Null),
        Type::UUID => nullable(
            row.try_get::<_, Option<uuid::Uuid>>(idx)?
                .map(|u| u.to_string()),
        ),
        Type::TIMESTAMPTZ => nullable(
            row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
                .map(|t| t.to_rfc3339()),
        ),
        Type::TIMESTAMP => nullable(
            row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        ),
        Type::DATE => nullable(
            row.try_get::<_, Option<chrono::NaiveDate>>(idx)?
                .map(|d| d.to_string()),
        ),
        ref other => {
            return Err(ReaderError::warehouse(format!(
                "column {:?} has unsupported type {other}",
                row.columns()[idx].name()
            )));
        }
    };
    Ok(value)
}
