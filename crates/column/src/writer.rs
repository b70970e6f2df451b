use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::format::{encode_entry_to_vec, file_name};
use crate::reader::ColumnReader;
use crate::value::{ColumnType, Value};
use crate::{ColumnError, RowId};

/// Where a column lives and what it holds. Cheap to clone; the query path
/// snapshots descriptors and opens its own readers from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    name: String,
    column_type: ColumnType,
    path: PathBuf,
}

impl ColumnDescriptor {
    /// Describes column `name` of `column_type` inside store directory `dir`.
    pub fn new(dir: &Path, name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_owned(),
            column_type,
            path: dir.join(file_name(name, column_type)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens an independent read handle positioned at the first entry.
    pub fn open_reader(&self) -> Result<ColumnReader, ColumnError> {
        ColumnReader::open(&self.path, self.column_type)
    }
}

/// Append-only handle on one column file.
///
/// The write handle is opened lazily on the first [`write`](ColumnFile::write)
/// (creating the file if needed) and kept until [`close`](ColumnFile::close).
/// Readers always use their own handles, so any number of them can coexist
/// with the writer.
#[derive(Debug)]
pub struct ColumnFile {
    desc: ColumnDescriptor,
    file: Option<File>,
}

impl ColumnFile {
    pub fn new(desc: ColumnDescriptor) -> Self {
        Self { desc, file: None }
    }

    pub fn descriptor(&self) -> &ColumnDescriptor {
        &self.desc
    }

    pub fn name(&self) -> &str {
        self.desc.name()
    }

    pub fn column_type(&self) -> ColumnType {
        self.desc.column_type()
    }

    pub fn path(&self) -> &Path {
        self.desc.path()
    }

    /// Returns `true` while a write handle is held.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Appends pre-encoded entry bytes. Succeeds once the write call has
    /// returned; nothing is fsynced here (see [`sync`](ColumnFile::sync)).
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), ColumnError> {
        let file = match self.file.take() {
            Some(f) => f,
            None => {
                tracing::debug!(path = %self.desc.path().display(), "opening column for append");
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.desc.path())?
            }
        };
        self.file.insert(file).write_all(bytes)?;
        Ok(())
    }

    /// Encodes `(row_id, value)` against this column's type and appends it.
    pub fn append(&mut self, row_id: RowId, value: &Value) -> Result<(), ColumnError> {
        let bytes = encode_entry_to_vec(row_id, value, self.column_type())?;
        self.write(&bytes)
    }

    /// Flushes file data to stable storage if a write handle is open.
    pub fn sync(&mut self) -> Result<(), ColumnError> {
        if let Some(f) = self.file.as_mut() {
            f.sync_data()?;
        }
        Ok(())
    }

    pub fn open_reader(&self) -> Result<ColumnReader, ColumnError> {
        self.desc.open_reader()
    }

    /// Syncs and releases the write handle. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<(), ColumnError> {
        match self.file.take() {
            Some(f) => {
                f.sync_all()?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn descriptor_path_follows_naming_convention() {
        let desc = ColumnDescriptor::new(Path::new("/data"), "temp", ColumnType::Float64);
        assert_eq!(desc.path(), Path::new("/data/temp.float64.dat"));
        assert_eq!(desc.name(), "temp");
    }

    #[test]
    fn file_is_created_lazily_on_first_write() -> Result<()> {
        let dir = tempdir()?;
        let mut col = ColumnFile::new(ColumnDescriptor::new(dir.path(), "v", ColumnType::Int64));
        assert!(!col.path().exists());
        assert!(!col.is_open());

        col.append(0, &Value::Int64(5))?;
        assert!(col.is_open());
        assert_eq!(std::fs::metadata(col.path())?.len(), 16);
        Ok(())
    }

    #[test]
    fn append_rejects_wrong_type_without_writing() -> Result<()> {
        let dir = tempdir()?;
        let mut col = ColumnFile::new(ColumnDescriptor::new(dir.path(), "v", ColumnType::Bool));
        let err = col.append(0, &Value::from("true")).unwrap_err();
        assert!(matches!(err, ColumnError::TypeMismatch { .. }));
        assert!(!col.path().exists());
        Ok(())
    }

    #[test]
    fn readers_see_appended_entries() -> Result<()> {
        let dir = tempdir()?;
        let mut col = ColumnFile::new(ColumnDescriptor::new(dir.path(), "s", ColumnType::Str));
        col.append(0, &Value::from("a"))?;
        col.append(3, &Value::from("b"))?;

        let mut r1 = col.open_reader()?;
        let mut r2 = col.open_reader()?;
        assert_eq!(r1.seek_to_row(3)?, Some(&Value::from("b")));
        // the second reader is independent of the first
        assert_eq!(r2.seek_to_row(0)?, Some(&Value::from("a")));
        Ok(())
    }

    #[test]
    fn close_is_idempotent_and_writes_reopen() -> Result<()> {
        let dir = tempdir()?;
        let mut col = ColumnFile::new(ColumnDescriptor::new(dir.path(), "b", ColumnType::Bool));
        col.close()?;
        col.append(0, &Value::Bool(true))?;
        col.close()?;
        col.close()?;
        assert!(!col.is_open());

        col.append(1, &Value::Bool(false))?;
        assert_eq!(std::fs::metadata(col.path())?.len(), 18);
        Ok(())
    }
}
