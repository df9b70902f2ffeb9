use crate::error::{StoreError, StoreResult};
use crate::record::{Dataset, Value};
use rust_xlsxwriter::{Format, Workbook};

/// Filename offered for the download artifact.
pub const DOWNLOAD_FILENAME: &str = "assets.xlsx";

/// MIME type offered for the download artifact.
pub const DOWNLOAD_MIME: &str = "application/vnd.ms-excel";

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Convert a dataset to XLSX format
///
/// Writes a single worksheet: the header row first, then one row per record
/// in dataset order. Text is written as strings, numbers as numbers and
/// datetimes as numbers carrying a date format so they read back as
/// datetimes. Empty cells are left blank.
///
/// # Arguments
/// * `dataset` - Reference to the dataset to convert
///
/// # Returns
/// * `StoreResult<Vec<u8>>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use assets_audit::downloader::to_xlsx;
/// use assets_audit::record::Dataset;
///
/// let dataset = Dataset::new(vec!["SITEID".into(), "SITENAME".into()]);
/// let bytes = to_xlsx(&dataset).unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// ```
pub fn to_xlsx(dataset: &Dataset) -> StoreResult<Vec<u8>> {
    let columns = dataset.columns();
    if columns.len() > u16::MAX as usize {
        return Err(StoreError::TooManyColumns(columns.len()));
    }
    if dataset.len() >= u32::MAX as usize {
        return Err(StoreError::TooManyRows(dataset.len()));
    }

    let mut workbook = Workbook::new();
    let datetime = Format::new().set_num_format(DATETIME_FORMAT);
    let worksheet = workbook.add_worksheet();

    for (c, name) in columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, name.as_str())?;
    }

    for (r, row) in dataset.rows().iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Empty => {}
                Value::Text(s) if s.is_empty() => {}
                Value::Text(s) => {
                    worksheet.write_string(r, c, s.as_str())?;
                }
                Value::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Value::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Value::DateTime(serial) => {
                    worksheet.write_number_with_format(r, c, *serial, &datetime)?;
                }
            }
        }
    }

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}
