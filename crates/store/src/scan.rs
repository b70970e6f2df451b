//! Query evaluation over the column files of a [`Store`].

use std::collections::HashMap;
use std::io;

use column::{ColumnError, ColumnReader, RowId, Value};
use query::{coerce, seed_row, Collect, CompareFn, ComparisonTable, Query, Reducer, Row};
use rowindex::IndexReader;

use crate::error::StoreError;
use crate::store::Store;

/// One filter, resolved against the column it targets.
struct PlannedFilter<'q> {
    attribute: &'q str,
    /// Comparison and coerced literal; `None` if the column does not exist,
    /// in which case no row can pass.
    test: Option<(CompareFn, Value)>,
}

/// Readers for every attribute a query touches. `None` stands for a column
/// that does not exist (yet), which reads as absent for every row.
type Cursors<'q> = HashMap<&'q str, Option<ColumnReader>>;

impl Store {
    /// Returns every row that satisfies all filters of `query`, in ascending
    /// row-id order.
    ///
    /// Each row carries `__index`, `__timestamp` and the values of the
    /// filtered attributes, plus the aggregation and group-by attributes
    /// when the row has them.
    ///
    /// # Errors
    ///
    /// Fails on I/O or corruption while scanning, or with
    /// [`StoreError::UnsupportedComparison`] when a filter's condition is not
    /// defined for its column's type. Malformed literals never fail; they
    /// are coerced.
    pub fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.reduce(query, Collect::default())
    }

    /// Streams the rows matching `query` into `reducer` and returns its
    /// output.
    pub fn reduce<R: Reducer>(&self, query: &Query, mut reducer: R) -> Result<R::Output, StoreError> {
        self.scan(query, |row| reducer.accept(row))?;
        Ok(reducer.finish())
    }

    /// Core scan loop. Returns the number of emitted rows.
    ///
    /// # Steps
    ///
    /// 1. Snapshot the next row-id; rows appended afterwards are not seen.
    /// 2. Open one reader per referenced attribute and resolve every filter
    ///    (comparison function + coerced literal) up front.
    /// 3. For each row-id below the snapshot, read its timestamp from the
    ///    index, then seek each filter's reader in declaration order. The
    ///    first absent value or failed comparison rejects the row.
    ///
    /// Readers are dropped when this returns, on every path.
    fn scan<F: FnMut(Row)>(&self, query: &Query, mut emit: F) -> Result<u64, StoreError> {
        let snapshot = self.next_row_id();
        let mut cursors = self.open_cursors(query)?;
        let filters = plan_filters(query, &cursors, &self.options.comparisons)?;
        let passthrough = query.passthrough_attributes();

        if snapshot == 0 {
            return Ok(0);
        }
        let mut timestamps = IndexReader::open(self.index_path())?;

        let mut matched = 0u64;
        'rows: for row_id in 0..snapshot {
            let timestamp = timestamps.timestamp_of(row_id)?;
            let mut row = seed_row(row_id, timestamp);

            for filter in &filters {
                let Some((compare, literal)) = &filter.test else {
                    continue 'rows;
                };
                let Some(value) = seek(&mut cursors, filter.attribute, row_id)? else {
                    continue 'rows;
                };
                if !compare(value, literal) {
                    continue 'rows;
                }
                row.insert(filter.attribute.to_owned(), value.clone());
            }

            for attribute in &passthrough {
                if let Some(value) = seek(&mut cursors, attribute, row_id)? {
                    row.insert((*attribute).to_owned(), value.clone());
                }
            }

            emit(row);
            matched += 1;
        }

        tracing::debug!(rows = snapshot, matched, "query scan complete");
        Ok(matched)
    }

    fn open_cursors<'q>(&self, query: &'q Query) -> Result<Cursors<'q>, StoreError> {
        let descriptors: Vec<_> = {
            let catalog = self.catalog.read();
            query
                .referenced_attributes()
                .into_iter()
                .map(|attr| (attr, catalog.get(attr).cloned()))
                .collect()
        };

        let mut cursors = Cursors::with_capacity(descriptors.len());
        for (attr, desc) in descriptors {
            let reader = match desc {
                None => None,
                Some(desc) => match desc.open_reader() {
                    Ok(reader) => Some(reader),
                    // registered by an append whose index write failed
                    Err(ColumnError::Io(e)) if e.kind() == io::ErrorKind::NotFound => None,
                    Err(e) => return Err(StoreError::column(attr, e)),
                },
            };
            cursors.insert(attr, reader);
        }
        Ok(cursors)
    }
}

fn plan_filters<'q>(
    query: &'q Query,
    cursors: &Cursors<'q>,
    comparisons: &ComparisonTable,
) -> Result<Vec<PlannedFilter<'q>>, StoreError> {
    let mut planned = Vec::with_capacity(query.filters.len());
    for filter in &query.filters {
        let attribute = filter.attribute.as_str();
        let test = match cursors.get(attribute).and_then(Option::as_ref) {
            Some(reader) => {
                let column_type = reader.column_type();
                let compare = comparisons.lookup(filter.condition, column_type)?;
                Some((compare, coerce(&filter.value, column_type)))
            }
            None => None,
        };
        planned.push(PlannedFilter { attribute, test });
    }
    Ok(planned)
}

/// Seeks the reader for `attribute` to `row_id`. Missing columns are absent.
fn seek<'c>(
    cursors: &'c mut Cursors<'_>,
    attribute: &str,
    row_id: RowId,
) -> Result<Option<&'c Value>, StoreError> {
    match cursors.get_mut(attribute).and_then(Option::as_mut) {
        Some(reader) => reader
            .seek_to_row(row_id)
            .map_err(|e| StoreError::column(attribute, e)),
        None => Ok(None),
    }
}
