use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::format::decode_entry;
use crate::value::{ColumnType, Value};
use crate::{ColumnError, RowId};

/// Forward-only cursor over one column file.
///
/// Column files are sparse: a row that did not supply the attribute has no
/// entry. [`seek_to_row`](ColumnReader::seek_to_row) therefore keeps the last
/// decoded entry around. When a read overshoots the requested row, that
/// entry stays pending and answers a later, larger target without
/// re-reading. An ascending scan over all row-ids costs one pass over the
/// file.
pub struct ColumnReader<R: Read = File> {
    /// `None` once the stream is exhausted or the reader is closed.
    rdr: Option<BufReader<R>>,
    column_type: ColumnType,
    /// Last decoded entry.
    cached: Option<(RowId, Value)>,
    /// Largest target requested so far.
    last_target: Option<RowId>,
}

impl ColumnReader<File> {
    pub fn open<P: AsRef<Path>>(path: P, column_type: ColumnType) -> Result<Self, ColumnError> {
        let f = File::open(path)?;
        Ok(Self::from_reader(f, column_type))
    }
}

impl<R: Read> ColumnReader<R> {
    pub fn from_reader(reader: R, column_type: ColumnType) -> Self {
        Self {
            rdr: Some(BufReader::new(reader)),
            column_type,
            cached: None,
            last_target: None,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Returns the value stored for `target`, or `None` if the column has no
    /// entry for that row.
    ///
    /// Targets must never decrease across calls on the same reader;
    /// repeating the previous target is allowed and gives the same answer.
    ///
    /// # Errors
    ///
    /// - [`ColumnError::BackwardSeek`] if `target` is below a previous target.
    /// - [`ColumnError::OutOfOrder`] if the file's row-ids are not strictly
    ///   ascending.
    /// - Decode and I/O errors from the underlying file.
    pub fn seek_to_row(&mut self, target: RowId) -> Result<Option<&Value>, ColumnError> {
        if let Some(previous) = self.last_target {
            if target < previous {
                return Err(ColumnError::BackwardSeek {
                    requested: target,
                    previous,
                });
            }
        }
        self.last_target = Some(target);

        loop {
            if let Some(row) = self.cached_row() {
                if row == target {
                    return Ok(self.cached.as_ref().map(|(_, v)| v));
                }
                if row > target {
                    // pending entry belongs to a later row
                    return Ok(None);
                }
            }

            let Some(rdr) = self.rdr.as_mut() else {
                return Ok(None);
            };
            match decode_entry(rdr, self.column_type) {
                Ok(Some((row, value))) => {
                    if let Some(previous) = self.cached_row() {
                        if row <= previous {
                            return Err(ColumnError::OutOfOrder {
                                previous,
                                found: row,
                            });
                        }
                    }
                    self.cached = Some((row, value));
                }
                Ok(None) => {
                    self.rdr = None;
                    return Ok(None);
                }
                Err(ColumnError::Truncated) => {
                    tracing::warn!(
                        target_row = target,
                        column_type = %self.column_type,
                        "truncated trailing column entry; treating as end of column"
                    );
                    self.rdr = None;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn cached_row(&self) -> Option<RowId> {
        self.cached.as_ref().map(|(row, _)| *row)
    }

    /// Releases the read handle. Later seeks report every row as absent.
    pub fn close(&mut self) {
        self.rdr = None;
    }

    pub fn is_closed(&self) -> bool {
        self.rdr.is_none()
    }
}
