use std::fmt;
use std::io;

use column::ColumnError;
use query::UnsupportedComparison;
use rowindex::IndexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("attribute name {name:?} uses the reserved `__` prefix")]
    ReservedName { name: String },
    #[error("attribute name {name:?} cannot be used as a column file name")]
    InvalidName { name: String },
    #[error("column {column:?}: {source}")]
    Column {
        column: String,
        #[source]
        source: ColumnError,
    },
    #[error("index: {0}")]
    Index(#[from] IndexError),
    #[error("unrecognized file {file:?} in store directory: {source}")]
    Discover {
        file: String,
        #[source]
        source: ColumnError,
    },
    #[error(transparent)]
    UnsupportedComparison(#[from] UnsupportedComparison),
    #[error("failed to close {}", CloseFailures(.failures.as_slice()))]
    Close { failures: Vec<StoreError> },
}

impl StoreError {
    pub(crate) fn column(column: &str, source: ColumnError) -> Self {
        StoreError::Column {
            column: column.to_owned(),
            source,
        }
    }
}

struct CloseFailures<'a>(&'a [StoreError]);

impl fmt::Display for CloseFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}
