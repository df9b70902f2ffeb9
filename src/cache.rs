use crate::error::StoreResult;
use crate::record::Dataset;
use crate::store::Storage;

/// In-memory copy of the dataset between interactions.
///
/// Populated from storage on first use and after [`DatasetCache::invalidate`].
/// A failed load is cached like a successful one: the cache holds an empty
/// dataset and keeps the error message until someone takes it.
pub struct DatasetCache<S> {
    storage: S,
    dataset: Option<Dataset>,
    load_error: Option<String>,
}

impl<S: Storage> DatasetCache<S> {
    pub fn new(storage: S) -> Self {
        DatasetCache {
            storage,
            dataset: None,
            load_error: None,
        }
    }

    pub fn get(&mut self) -> &Dataset {
        self.populate();
        self.dataset.get_or_insert_with(Dataset::default)
    }

    pub fn get_mut(&mut self) -> &mut Dataset {
        self.populate();
        self.dataset.get_or_insert_with(Dataset::default)
    }

    /// Write the cached dataset back through the storage.
    pub fn save(&mut self) -> StoreResult<()> {
        self.populate();
        let dataset = self.dataset.get_or_insert_with(Dataset::default);
        self.storage.save(dataset)
    }

    /// Serialise the cached dataset for download.
    pub fn export(&mut self) -> StoreResult<Vec<u8>> {
        self.populate();
        let dataset = self.dataset.get_or_insert_with(Dataset::default);
        self.storage.export(dataset)
    }

    /// Drop the dataset so the next read goes back to storage.
    pub fn invalidate(&mut self) {
        self.dataset = None;
        self.load_error = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    /// Error from the most recent load, if it failed and was not yet taken.
    pub fn take_load_error(&mut self) -> Option<String> {
        self.load_error.take()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn populate(&mut self) {
        if self.dataset.is_some() {
            return;
        }
        let dataset = match self.storage.load() {
            Ok(dataset) => dataset,
            Err(e) => {
                log::error!("load failed: {}", e);
                self.load_error = Some(e.to_string());
                Dataset::default()
            }
        };
        self.dataset = Some(dataset);
    }
}
