use std::collections::BTreeMap;

use column::{RowId, Value};

/// Synthetic key holding the row-id of a result row.
pub const INDEX_KEY: &str = "__index";

/// Synthetic key holding the append timestamp (ns since epoch) of a result row.
pub const TIMESTAMP_KEY: &str = "__timestamp";

/// One result row: attribute name to value, plus the synthetic
/// [`INDEX_KEY`] and [`TIMESTAMP_KEY`] entries.
pub type Row = BTreeMap<String, Value>;

/// Builds the seed of a result row before any column is attached.
pub fn seed_row(row_id: RowId, timestamp: i64) -> Row {
    let mut row = Row::new();
    row.insert(INDEX_KEY.to_owned(), Value::Int64(row_id as i64));
    row.insert(TIMESTAMP_KEY.to_owned(), Value::Int64(timestamp));
    row
}

/// Consumer of the post-filter row stream.
///
/// Rows arrive in ascending row-id order. This is the extension point for
/// aggregation (`Count`, `Sum`, grouping); the scan itself only filters.
pub trait Reducer {
    type Output;

    fn accept(&mut self, row: Row);

    fn finish(self) -> Self::Output;
}

/// Collects every matching row.
#[derive(Debug, Default)]
pub struct Collect {
    rows: Vec<Row>,
}

impl Reducer for Collect {
    type Output = Vec<Row>;

    fn accept(&mut self, row: Row) {
        self.rows.push(row);
    }

    fn finish(self) -> Vec<Row> {
        self.rows
    }
}
