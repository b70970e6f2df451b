use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use column::{format, ColumnDescriptor, ColumnError, ColumnFile, ColumnType, RowId, Value};
use parking_lot::{Mutex, RwLock};
use rowindex::{IndexEntry, IndexWriter, INDEX_FILE_NAME};

use crate::config::StoreOptions;
use crate::error::StoreError;

/// Prefix reserved for synthetic attributes and store-internal files.
pub const RESERVED_PREFIX: &str = "__";

/// An append-only columnar store rooted at one directory.
///
/// # Layout
///
/// - `__index.dat`: one 16-byte `(row_id, timestamp)` record per row.
/// - `<name>.<suffix>.dat`: one sparse file per attribute; the suffix
///   (`bool`, `int64`, `float64`, `str`) is the only persisted schema.
///
/// # Write path
///
/// [`append`](Store::append) validates names and encodes every field, then
/// under the store-wide append lock assigns the next row-id, writes the
/// index record, and writes one entry per attribute. The row-id advances
/// once all column writes have been attempted.
///
/// # Read path
///
/// [`query`](Store::query) never takes the append lock. It snapshots the
/// next row-id and the column catalog, opens its own readers and scans
/// row-ids `0..snapshot` in order.
///
/// # Recovery
///
/// [`open`](Store::open) rebuilds the catalog from file names and derives
/// the next row-id from the index file length.
pub struct Store {
    pub(crate) dir: PathBuf,
    pub(crate) options: StoreOptions,
    pub(crate) next_row_id: AtomicU64,
    writers: Mutex<Writers>,
    pub(crate) catalog: RwLock<HashMap<String, ColumnDescriptor>>,
}

/// Everything the append lock guards.
struct Writers {
    index: IndexWriter,
    columns: HashMap<String, ColumnFile>,
}

/// Checks that `name` can be stored as a user attribute.
///
/// # Errors
///
/// - [`StoreError::ReservedName`] for names starting with `__`.
/// - [`StoreError::InvalidName`] for empty names and names containing `.`,
///   a path separator or NUL, none of which survive the file-name round trip.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.starts_with(RESERVED_PREFIX) {
        return Err(StoreError::ReservedName {
            name: name.to_owned(),
        });
    }
    if name.is_empty() || name.contains(['.', '/', '\\', '\0']) {
        return Err(StoreError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

impl Store {
    /// Opens (or creates) the store in `dir` with default options.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        Self::open_with(dir, StoreOptions::default())
    }

    /// Opens the store in `dir`.
    ///
    /// # Recovery Steps
    ///
    /// 1. Create the directory if allowed and missing.
    /// 2. Derive the next row-id from the index length; a length that is not
    ///    a multiple of 16 fails with `CorruptIndex`.
    /// 3. Register every `<name>.<suffix>.dat` file as a column. Any other
    ///    `.dat` file makes the directory unusable.
    /// 4. Open the index for appending.
    pub fn open_with<P: AsRef<Path>>(dir: P, options: StoreOptions) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        if options.create_if_missing {
            std::fs::create_dir_all(&dir)?;
        }

        let index_path = dir.join(INDEX_FILE_NAME);
        let next_row_id = rowindex::next_row_id(&index_path)?;

        let catalog = discover_columns(&dir)?;
        let columns = catalog
            .iter()
            .map(|(name, desc)| (name.clone(), ColumnFile::new(desc.clone())))
            .collect();

        let index = IndexWriter::create(&index_path, options.sync_on_append)?;

        tracing::info!(
            dir = %dir.display(),
            next_row_id,
            columns = catalog.len(),
            "opened column store"
        );

        Ok(Self {
            dir,
            options,
            next_row_id: AtomicU64::new(next_row_id),
            writers: Mutex::new(Writers { index, columns }),
            catalog: RwLock::new(catalog),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// The row-id the next append will receive, which is also the number of
    /// rows appended so far.
    pub fn next_row_id(&self) -> RowId {
        self.next_row_id.load(Ordering::Acquire)
    }

    /// Known columns and their types, sorted by name.
    pub fn columns(&self) -> Vec<(String, ColumnType)> {
        let mut cols: Vec<_> = self
            .catalog
            .read()
            .values()
            .map(|d| (d.name().to_owned(), d.column_type()))
            .collect();
        cols.sort();
        cols
    }

    pub(crate) fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    /// Appends one record and returns its row-id.
    ///
    /// Attributes that have no column yet get one, typed after the supplied
    /// value. A name repeated within `record` keeps its last value.
    ///
    /// # Errors
    ///
    /// Name validation and encoding (`TypeMismatch`, `ValueTooLarge`) are
    /// checked before anything is written; such failures consume no row-id
    /// and create no file. A failed index write also leaves the row-id
    /// unconsumed and registers none of the record's new columns.
    ///
    /// A failed column write is different: the index record is already on
    /// disk, the row-id is consumed, and the row stays without the values
    /// whose writes failed. The remaining columns are still written and the
    /// first failure is returned.
    pub fn append<I, K, V>(&self, record: I) -> Result<RowId, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields: BTreeMap<String, Value> = record
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for name in fields.keys() {
            validate_name(name)?;
        }

        let mut writers = self.writers.lock();
        let row_id = self.next_row_id.load(Ordering::Acquire);

        let mut batch = Vec::with_capacity(fields.len());
        for (name, value) in &fields {
            let column_type = writers
                .columns
                .get(name)
                .map_or_else(|| value.column_type(), ColumnFile::column_type);
            let bytes = format::encode_entry_to_vec(row_id, value, column_type)
                .map_err(|e| StoreError::column(name, e))?;
            batch.push((name, bytes));
        }

        writers.index.append(IndexEntry {
            row_id,
            timestamp: rowindex::now_nanos(),
        })?;

        // new columns only for rows that made it into the index
        for (name, value) in &fields {
            if writers.columns.contains_key(name) {
                continue;
            }
            let desc = ColumnDescriptor::new(&self.dir, name, value.column_type());
            tracing::debug!(
                column = %name,
                column_type = %desc.column_type(),
                "registering new column"
            );
            self.catalog.write().insert(name.clone(), desc.clone());
            writers.columns.insert(name.clone(), ColumnFile::new(desc));
        }

        let sync = self.options.sync_on_append;
        let mut first_err = None;
        for (name, bytes) in batch {
            let Some(col) = writers.columns.get_mut(name) else {
                continue;
            };
            let res = col.write(&bytes).and_then(|()| if sync { col.sync() } else { Ok(()) });
            if let Err(e) = res {
                tracing::warn!(
                    row_id,
                    column = %name,
                    error = %e,
                    "column write failed; row is partially populated"
                );
                first_err.get_or_insert(StoreError::column(name, e));
            }
        }

        self.next_row_id.store(row_id + 1, Ordering::Release);
        match first_err {
            Some(e) => Err(e),
            None => Ok(row_id),
        }
    }

    /// Syncs the index and closes every open column write handle.
    ///
    /// Every file gets a close attempt; all failures are reported together.
    /// The store stays usable: a later append reopens the handles it needs.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut writers = self.writers.lock();
        let mut failures = Vec::new();

        if let Err(e) = writers.index.sync() {
            failures.push(StoreError::Index(e));
        }
        for (name, col) in writers.columns.iter_mut() {
            if let Err(e) = col.close() {
                failures.push(StoreError::column(name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            tracing::warn!(failed = failures.len(), "errors while closing column store");
            Err(StoreError::Close { failures })
        }
    }
}

/// Rebuilds the column catalog from the file names in `dir`.
fn discover_columns(dir: &Path) -> Result<HashMap<String, ColumnDescriptor>, StoreError> {
    let mut catalog = HashMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file) = file_name.to_str() else {
            if Path::new(&file_name).extension() == Some(OsStr::new(format::EXTENSION)) {
                let file = file_name.to_string_lossy().into_owned();
                return Err(StoreError::Discover {
                    source: ColumnError::InvalidFileName { file: file.clone() },
                    file,
                });
            }
            continue;
        };
        if file == INDEX_FILE_NAME {
            continue;
        }

        let discover_err = |source: ColumnError| StoreError::Discover {
            file: file.to_owned(),
            source,
        };
        let Some((name, column_type)) = format::parse_file_name(file).map_err(discover_err)? else {
            continue;
        };
        if let Some(existing) = catalog.get(&name).map(ColumnDescriptor::column_type) {
            return Err(discover_err(ColumnError::TypeMismatch {
                expected: existing,
                found: column_type,
            }));
        }
        let desc = ColumnDescriptor::new(dir, &name, column_type);
        catalog.insert(name, desc);
    }
    Ok(catalog)
}
