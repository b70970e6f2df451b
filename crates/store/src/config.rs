use query::ComparisonTable;

/// Options for [`Store::open_with`](crate::Store::open_with).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Create the store directory (and parents) if it does not exist.
    pub create_if_missing: bool,

    /// If `true`, every append syncs the index and each touched column file
    /// before returning.
    pub sync_on_append: bool,

    /// Condition × type matrix used to evaluate filters.
    pub comparisons: ComparisonTable,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_append: false,
            comparisons: ComparisonTable::standard(),
        }
    }
}

impl StoreOptions {
    pub fn create_if_missing(mut self, yes: bool) -> Self {
        self.create_if_missing = yes;
        self
    }

    pub fn sync_on_append(mut self, yes: bool) -> Self {
        self.sync_on_append = yes;
        self
    }

    pub fn comparisons(mut self, table: ComparisonTable) -> Self {
        self.comparisons = table;
        self
    }
}
