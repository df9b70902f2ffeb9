use crate::error::{StoreError, StoreResult};
use crate::record::{Dataset, Value};
use calamine::{Data, Range, Reader, Xlsx};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::iter;
use std::path::Path;

/// Load a dataset from an Excel file
///
/// Reads the first worksheet only. The first row is the header; every
/// following row becomes one record, blank rows included, in file order.
///
/// # Arguments
/// * `filepath` - Path to the XLSX file to load
///
/// # Returns
/// * `StoreResult<Dataset>` - The loaded dataset or an error
///
/// # Examples
/// ```no_run
/// use assets_audit::loader::from_excel;
///
/// match from_excel("assets.xlsx") {
///     Ok(dataset) => println!("Loaded {} records", dataset.len()),
///     Err(e) => eprintln!("Error loading workbook: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>) -> StoreResult<Dataset> {
    let path = filepath.as_ref();
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    from_reader(BufReader::new(file))
}

/// Load a dataset from an in-memory XLSX buffer
pub fn from_bytes(bytes: &[u8]) -> StoreResult<Dataset> {
    from_reader(Cursor::new(bytes))
}

fn from_reader<R: Read + Seek>(reader: R) -> StoreResult<Dataset> {
    let mut workbook: Xlsx<_> = Xlsx::new(reader)?;

    // Get the first worksheet
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(StoreError::NoSheets)??;

    Ok(dataset_from_range(&range))
}

// The range starts at the first used cell; leading blank columns are kept
// so a save writes every column back where it was.
fn dataset_from_range(range: &Range<Data>) -> Dataset {
    let offset = range.start().map_or(0, |(_, col)| col as usize);
    let mut rows = range.rows();

    let Some(header) = rows.next() else {
        return Dataset::default();
    };
    let header: Vec<Data> = iter::repeat_n(Data::Empty, offset)
        .chain(header.iter().cloned())
        .collect();
    let mut dataset = Dataset::new(header_names(&header));

    for row in rows {
        dataset.push_row(
            iter::repeat_n(Value::Empty, offset)
                .chain(row.iter().map(cell_value))
                .collect(),
        );
    }

    dataset
}

// Blank headers become "Unnamed: <index>", repeats get a ".<n>" suffix.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());

    for (index, cell) in header.iter().enumerate() {
        let raw = cell_value(cell);
        let base = if raw.is_empty() {
            format!("Unnamed: {}", index)
        } else {
            raw.to_string()
        };

        let mut name = base.clone();
        while used.contains(&name) {
            let count = repeats.entry(base.clone()).or_insert(0);
            *count += 1;
            name = format!("{}.{}", base, count);
        }
        used.insert(name.clone());
        names.push(name);
    }

    names
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) if s.is_empty() => Value::Empty,
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => Value::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(e.to_string()),
    }
}
