use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the storage adapter.
///
/// None of these are fatal to the application: the cache turns a load
/// failure into an empty dataset and the audit session turns a save failure
/// into a failed outcome.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("cannot write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("dataset has {0} columns, more than a worksheet can hold")]
    TooManyColumns(usize),

    #[error("dataset has {0} rows, more than a worksheet can hold")]
    TooManyRows(usize),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
