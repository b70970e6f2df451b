//! # Query
//!
//! The request model and evaluation rules for scans over a column store.
//!
//! A [`Query`] is a list of [`Filter`]s, each naming an attribute, a
//! [`Condition`] and an untyped literal. At scan time the literal is
//! [`coerce`]d to the column's type and the pair is dispatched through a
//! [`ComparisonTable`]. Matching rows flow into a [`Reducer`].

mod aggregate;
mod coerce;
mod compare;
mod filter;

pub use aggregate::{seed_row, Collect, Reducer, Row, INDEX_KEY, TIMESTAMP_KEY};
pub use coerce::coerce;
pub use compare::{CompareFn, ComparisonTable, UnsupportedComparison};
pub use filter::{Aggregation, AggregatorKind, Condition, Filter, Query};
