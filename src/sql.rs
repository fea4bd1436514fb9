//! Query text for the "not yet uploaded" read.
//!
//! Table paths are interpolated into the query, so every identifier is
//! validated and quoted for the target dialect first. The dataset may be
//! qualified (`project.dataset`); each of its segments is checked on its own.
//! For well-formed names
//! the generated query is the plain anti-join:
//!
//! ```sql
//! SELECT data.* FROM `ds.events` data
//! LEFT JOIN `ds.events_uploaded` uploaded ON data.uuid = uploaded.uuid
//! WHERE uploaded.uuid IS NULL
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

/// Suffix of the companion table recording delivered rows.
pub const UPLOADED_SUFFIX: &str = "_uploaded";

/// Column joining a source table with its companion table.
pub const UUID_COLUMN: &str = "uuid";

/// SQL flavour understood by a warehouse client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Backtick-quoted `dataset.table` paths.
    #[default]
    BigQuery,
    /// Double-quoted `"schema"."table"` paths.
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::BigQuery => "bigquery",
            Dialect::Postgres => "postgres",
        }
    }

    /// Quote a `dataset.table` path.
    pub fn quote_table(&self, table: &TableRef) -> String {
        match self {
            Dialect::BigQuery => format!("`{}.{}`", table.dataset, table.table),
            Dialect::Postgres => {
                let mut path: Vec<String> = table.dataset.split('.').map(quote_ident).collect();
                path.push(quote_ident(&table.table));
                path.join(".")
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PostgreSQL identifier quoting.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A validated `dataset.table` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    /// Build a reference, rejecting identifiers that cannot be quoted in
    /// every dialect. `dataset` may carry a `project.` prefix; `table` may not.
    pub fn new(dataset: &str, table: &str) -> Result<Self, ReaderError> {
        if dataset.split('.').any(|segment| !is_valid_ident(segment)) {
            return Err(ReaderError::InvalidIdentifier(dataset.to_string()));
        }
        if !is_valid_ident(table) {
            return Err(ReaderError::InvalidIdentifier(table.to_string()));
        }
        Ok(TableRef {
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }

    /// The companion table holding uuids of already delivered rows.
    pub fn uploaded(&self) -> TableRef {
        TableRef {
            dataset: self.dataset.clone(),
            table: format!("{}{UPLOADED_SUFFIX}", self.table),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// A single path segment: non-empty, with no quote character, path
/// separator or control character.
fn is_valid_ident(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, '`' | '"' | '\\' | '.' | ';') || c.is_control())
}

/// Select every column of `table` whose uuid is absent from its
/// `_uploaded` companion.
pub fn not_uploaded_query(table: &TableRef, dialect: Dialect) -> String {
    let uuid = UUID_COLUMN;
    format!(
        "SELECT data.* FROM {source} data \
         LEFT JOIN {uploaded} uploaded ON data.{uuid} = uploaded.{uuid} \
         WHERE uploaded.{uuid} IS NULL",
        source = dialect.quote_table(table),
        uploaded = dialect.quote_table(&table.uploaded()),
    )
}
