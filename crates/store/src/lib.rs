//! # Store
//!
//! An embedded, append-only columnar store. Every attribute of a record is
//! persisted in its own sparse column file, rows are identified by a dense,
//! monotonically increasing row-id, and queries filter rows by scanning the
//! referenced column files forward in row-id order.
//!
//! ## Example
//! ```no_run
//! use store::{Filter, Query, Store};
//!
//! let store = Store::open("/tmp/metrics")?;
//! store.append([("host", "a")])?;
//! let rows = store.query(&Query::new().filter(Filter::equals("host", "a")))?;
//! assert_eq!(rows.len(), 1);
//! store.close()?;
//! # Ok::<(), store::StoreError>(())
//! ```

mod config;
mod error;
mod scan;
mod store;

pub use config::StoreOptions;
pub use error::StoreError;
pub use store::{validate_name, Store, RESERVED_PREFIX};

pub use column::{ColumnType, RowId, Value};
pub use query::{
    Aggregation, AggregatorKind, Collect, ComparisonTable, Condition, Filter, Query, Reducer, Row,
    INDEX_KEY, TIMESTAMP_KEY,
};
