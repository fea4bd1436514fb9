#![no_main]

use libfuzzer_sys::fuzz_target;
use megalista_reader::sql::{Dialect, TableRef, not_uploaded_query};

// Any identifier pair that validates must produce a query in which the
// quoted paths cannot be closed early.
fuzz_target!(|data: (&str, &str)| {
    let (dataset, table) = data;
    let Ok(t) = TableRef::new(dataset, table) else {
        return;
    };
    let bq = not_uploaded_query(&t, Dialect::BigQuery);
    assert_eq!(bq.matches('`').count(), 4);
    assert!(bq.ends_with("WHERE uploaded.uuid IS NULL"));

    // Two quotes per segment: dataset segments plus the table, twice.
    let segments = t.dataset.split('.').count() + 1;
    let pg = not_uploaded_query(&t, Dialect::Postgres);
    assert_eq!(pg.matches('"').count(), 4 * segments);
});
