//! Storage adapter for the backing spreadsheet file.
//!
//! [`Storage`] is the seam between the audit session and persistence.
//! [`XlsxStore`] is the production implementation: it owns nothing but the
//! path of the backing file and rewrites the whole file on every save.

use crate::downloader;
use crate::error::{StoreError, StoreResult};
use crate::loader;
use crate::record::Dataset;
use crate::saving;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub trait Storage {
    /// Read the backing file fully into memory.
    fn load(&self) -> StoreResult<Dataset>;

    /// Overwrite the backing file with the full dataset.
    fn save(&self, dataset: &Dataset) -> StoreResult<()>;

    /// Serialise the dataset in the backing file's format without touching
    /// the file.
    fn export(&self, dataset: &Dataset) -> StoreResult<Vec<u8>>;
}

/// Backing file in XLSX format, first sheet only.
#[derive(Clone, Debug)]
pub struct XlsxStore {
    path: PathBuf,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XlsxStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for XlsxStore {
    fn load(&self) -> StoreResult<Dataset> {
        let started = Instant::now();
        let dataset = loader::from_excel(&self.path)?;
        log::info!(
            "loaded {} records ({} columns) from {} in {:?}",
            dataset.len(),
            dataset.columns().len(),
            self.path.display(),
            started.elapsed()
        );
        Ok(dataset)
    }

    fn save(&self, dataset: &Dataset) -> StoreResult<()> {
        let bytes = downloader::to_xlsx(dataset)?;
        saving::write_atomically(&self.path, &bytes).map_err(|e| StoreError::io(&self.path, e))?;
        log::info!(
            "saved {} records to {} ({} bytes)",
            dataset.len(),
            self.path.display(),
            bytes.len()
        );
        Ok(())
    }

    fn export(&self, dataset: &Dataset) -> StoreResult<Vec<u8>> {
        let bytes = downloader::to_xlsx(dataset)?;
        log::debug!("exported {} records ({} bytes)", dataset.len(), bytes.len());
        Ok(bytes)
    }
}
