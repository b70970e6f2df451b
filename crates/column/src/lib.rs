//! # Column
//!
//! Per-attribute column files for the columnar store.
//!
//! Each attribute of a record is persisted in its own append-only file,
//! `<name>.<suffix>.dat`, where the suffix names the value type. Files are
//! **sparse**: a row appears only if it supplied the attribute, and entries
//! are always in strictly ascending row-id order.
//!
//! - [`format`] — the binary entry codec and file-name convention.
//! - [`ColumnFile`] — the lazily opened append handle owned by the store.
//! - [`ColumnReader`] — a forward-only cursor used by query scans.

pub mod format;
mod reader;
mod value;
mod writer;

use std::io;

use thiserror::Error;

pub use format::{MAX_STR_BYTES, ROW_ID_BYTES};
pub use reader::ColumnReader;
pub use value::{ColumnType, Value};
pub use writer::{ColumnDescriptor, ColumnFile};

/// Row identifier shared by the index and every column.
pub type RowId = u64;

#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("type mismatch: column is {expected}, value is {found}")]
    TypeMismatch {
        expected: ColumnType,
        found: ColumnType,
    },
    #[error("string of {len} bytes exceeds the {} byte limit", MAX_STR_BYTES)]
    ValueTooLarge { len: usize },
    #[error("cannot seek backwards to row {requested} after row {previous}")]
    BackwardSeek { requested: RowId, previous: RowId },
    #[error("corrupt column: row {found} follows row {previous}")]
    OutOfOrder { previous: RowId, found: RowId },
    #[error("truncated column entry")]
    Truncated,
    #[error("corrupt column: string at row {row_id} is not valid utf-8")]
    InvalidUtf8 { row_id: RowId },
    #[error("corrupt column: bool flag {byte} at row {row_id} is neither 0 nor 1")]
    InvalidBool { row_id: RowId, byte: u8 },
    #[error("invalid column file name: {file}")]
    InvalidFileName { file: String },
    #[error("unknown column type suffix {suffix:?} in {file}")]
    UnknownSuffix { file: String, suffix: String },
}
