//! # Row index
//!
//! The `__index.dat` stream of a column store. Every append writes exactly
//! one fixed-size record, so the file is dense and its length alone gives
//! the next free row-id:
//!
//! ```text
//! [row_id: u64 LE][timestamp_ns: i64 LE]   16 bytes per row
//! ```
//!
//! A length that is not a multiple of 16 means a torn write from a crash.
//! Nothing here attempts to repair it; [`next_row_id`] refuses to continue.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// File name of the index inside a store directory.
pub const INDEX_FILE_NAME: &str = "__index.dat";

/// Size of one index record in bytes.
pub const RECORD_BYTES: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub row_id: u64,
    /// Wall-clock nanoseconds since the Unix epoch at append time.
    pub timestamp: i64,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt index: size {len} is not a multiple of {}", RECORD_BYTES)]
    CorruptIndex { len: u64 },
    #[error("corrupt index: expected row {expected}, found {found}")]
    OutOfOrder { expected: u64, found: u64 },
    #[error("index has no entry for row {row_id}")]
    Missing { row_id: u64 },
    #[error("cannot seek backwards to row {requested}; next row is {next}")]
    BackwardSeek { requested: u64, next: u64 },
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos()).map_or(i64::MIN, |n| -n),
    }
}

/// Recovers the next free row-id from the index file length.
///
/// A missing file is an empty store (`Ok(0)`).
///
/// # Errors
///
/// [`IndexError::CorruptIndex`] if the length is not a multiple of
/// [`RECORD_BYTES`].
pub fn next_row_id<P: AsRef<Path>>(path: P) -> Result<u64, IndexError> {
    let len = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };
    if len % RECORD_BYTES != 0 {
        return Err(IndexError::CorruptIndex { len });
    }
    Ok(len / RECORD_BYTES)
}

/// Appends index records. The file is created on construction.
pub struct IndexWriter {
    file: File,
    sync: bool,
}

impl IndexWriter {
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, IndexError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file, sync })
    }

    /// Appends one record with a single write call and (optionally) syncs.
    pub fn append(&mut self, entry: IndexEntry) -> Result<(), IndexError> {
        let mut buf = Vec::with_capacity(RECORD_BYTES as usize);
        buf.write_u64::<LittleEndian>(entry.row_id)?;
        buf.write_i64::<LittleEndian>(entry.timestamp)?;
        self.file.write_all(&buf)?;

        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<(), IndexError> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Sequential reader over the index stream.
///
/// Row-ids are dense, so the reader checks every record against the row it
/// expects next and reports a mismatch as corruption.
pub struct IndexReader<R: Read> {
    rdr: BufReader<R>,
    next_row: u64,
}

impl IndexReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<IndexReader<File>, IndexError> {
        let f = File::open(path)?;
        Ok(IndexReader::from_reader(f))
    }
}

impl<R: Read> IndexReader<R> {
    pub fn from_reader(reader: R) -> Self {
        IndexReader {
            rdr: BufReader::new(reader),
            next_row: 0,
        }
    }

    /// Reads the next record, or `Ok(None)` at end of stream. A partial
    /// trailing record also ends the stream.
    pub fn next_entry(&mut self) -> Result<Option<IndexEntry>, IndexError> {
        let row_id = match self.rdr.read_u64::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let timestamp = match self.rdr.read_i64::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if row_id != self.next_row {
            return Err(IndexError::OutOfOrder {
                expected: self.next_row,
                found: row_id,
            });
        }
        self.next_row += 1;
        Ok(Some(IndexEntry { row_id, timestamp }))
    }

    /// Returns the timestamp recorded for `row_id`, reading forward as
    /// needed. Rows must be requested in ascending order.
    pub fn timestamp_of(&mut self, row_id: u64) -> Result<i64, IndexError> {
        if row_id < self.next_row {
            return Err(IndexError::BackwardSeek {
                requested: row_id,
                next: self.next_row,
            });
        }
        loop {
            match self.next_entry()? {
                Some(entry) if entry.row_id == row_id => return Ok(entry.timestamp),
                Some(_) => continue,
                None => return Err(IndexError::Missing { row_id }),
            }
        }
    }

    /// Feeds every record to `apply`, in order.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<(), IndexError>
    where
        F: FnMut(IndexEntry),
    {
        while let Some(entry) = self.next_entry()? {
            apply(entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn raw_record(row_id: u64, ts: i64) -> Vec<u8> {
        let mut buf = row_id.to_le_bytes().to_vec();
        buf.extend_from_slice(&ts.to_le_bytes());
        buf
    }

    #[test]
    fn write_and_replay() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(INDEX_FILE_NAME);

        {
            let mut w = IndexWriter::create(&path, true)?;
            for i in 0..3u64 {
                w.append(IndexEntry {
                    row_id: i,
                    timestamp: 1_000 + i as i64,
                })?;
            }
        }

        assert_eq!(fs::metadata(&path)?.len(), 3 * RECORD_BYTES);

        let mut reader = IndexReader::open(&path)?;
        let mut entries = Vec::new();
        reader.replay(|e| entries.push(e))?;
        assert_eq!(
            entries,
            vec![
                IndexEntry { row_id: 0, timestamp: 1_000 },
                IndexEntry { row_id: 1, timestamp: 1_001 },
                IndexEntry { row_id: 2, timestamp: 1_002 },
            ]
        );
        Ok(())
    }

    #[test]
    fn next_row_id_from_length() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(INDEX_FILE_NAME);
        assert_eq!(next_row_id(&path)?, 0);

        let mut w = IndexWriter::create(&path, false)?;
        assert_eq!(next_row_id(&path)?, 0);
        for i in 0..7u64 {
            w.append(IndexEntry { row_id: i, timestamp: 0 })?;
        }
        assert_eq!(next_row_id(&path)?, 7);
        Ok(())
    }

    #[test]
    fn misaligned_length_is_corrupt() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(INDEX_FILE_NAME);
        let mut bytes = raw_record(0, 5);
        bytes.extend_from_slice(&[1, 2, 3]);
        fs::write(&path, &bytes)?;

        let err = next_row_id(&path).unwrap_err();
        assert!(matches!(err, IndexError::CorruptIndex { len: 19 }));
        Ok(())
    }

    #[test]
    fn timestamp_lookup_moves_forward() -> Result<()> {
        let mut bytes = Vec::new();
        for i in 0..5u64 {
            bytes.extend(raw_record(i, i as i64 * 10));
        }
        let mut r = IndexReader::from_reader(Cursor::new(bytes));
        assert_eq!(r.timestamp_of(0)?, 0);
        assert_eq!(r.timestamp_of(3)?, 30);
        assert!(matches!(
            r.timestamp_of(2),
            Err(IndexError::BackwardSeek { requested: 2, next: 4 })
        ));
        assert_eq!(r.timestamp_of(4)?, 40);
        assert!(matches!(r.timestamp_of(5), Err(IndexError::Missing { row_id: 5 })));
        Ok(())
    }

    #[test]
    fn gap_in_row_ids_is_corruption() {
        let mut bytes = raw_record(0, 1);
        bytes.extend(raw_record(2, 1));
        let mut r = IndexReader::from_reader(Cursor::new(bytes));
        assert!(r.next_entry().unwrap().is_some());
        assert!(matches!(
            r.next_entry(),
            Err(IndexError::OutOfOrder { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn partial_trailing_record_ends_stream() {
        let mut bytes = raw_record(0, 9);
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 7]);
        let mut r = IndexReader::from_reader(Cursor::new(bytes));
        assert_eq!(r.next_entry().unwrap(), Some(IndexEntry { row_id: 0, timestamp: 9 }));
        assert_eq!(r.next_entry().unwrap(), None);
    }

    #[test]
    fn clock_is_after_epoch() {
        assert!(now_nanos() > 0);
    }
}
