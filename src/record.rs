use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// Identifier column. Never editable once a row exists.
pub const ID_COLUMN: &str = "SITEID";

/// Display-name column. Never editable once a row exists.
pub const NAME_COLUMN: &str = "SITENAME";

/// Returns true for the columns an edit may never touch.
pub fn is_immutable(column: &str) -> bool {
    column == ID_COLUMN || column == NAME_COLUMN
}

/// One cell of the dataset.
///
/// `DateTime` holds the Excel serial number (days since 1899-12-30) so it can
/// be written back without losing precision.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Bool(bool),
    Number(f64),
    DateTime(f64),
    Text(String),
}

impl Value {
    /// Value stored for an edited field. Edits are always text; an empty
    /// submission clears the cell.
    pub fn from_edit(input: &str) -> Self {
        if input.is_empty() {
            Value::Empty
        } else {
            Value::Text(input.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Number(n) => write!(f, "{}", n),
            Value::DateTime(serial) => match serial_to_datetime(*serial) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "{}", serial),
            },
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Convert an Excel serial date to a calendar datetime, rounded to the
/// millisecond.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if millis.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    epoch.checked_add_signed(Duration::milliseconds(millis as i64))
}

/// Stable handle on a row: its identifier plus how many earlier rows carry
/// the same identifier. Unlike a position it is unaffected by edits to other
/// rows, and it keeps duplicate identifiers apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RowKey {
    pub site_id: String,
    pub ordinal: usize,
}

impl RowKey {
    pub fn new(site_id: impl Into<String>, ordinal: usize) -> Self {
        RowKey {
            site_id: site_id.into(),
            ordinal,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.site_id, self.ordinal)
    }
}

/// Proposed field changes for one row, in column order.
#[derive(Clone, Debug, PartialEq)]
pub struct EditDraft {
    pub key: RowKey,
    fields: Vec<(String, String)>,
}

impl EditDraft {
    pub fn new(key: RowKey) -> Self {
        EditDraft {
            key,
            fields: Vec::new(),
        }
    }

    /// Set a proposed value. Identifier and name columns are refused.
    /// Returns whether the field was accepted.
    pub fn set(&mut self, column: &str, value: impl Into<String>) -> bool {
        if is_immutable(column) {
            return false;
        }
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column.to_string(), value)),
        }
        true
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The in-memory table mirroring the backing file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Dataset {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut dataset = Dataset::new(columns);
        for row in rows {
            dataset.push_row(row);
        }
        dataset
    }

    /// Append a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, position: usize) -> Option<&[Value]> {
        self.rows.get(position).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn value(&self, position: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(position)?.get(index)
    }

    /// String form of a row's identifier; empty when the column is missing.
    pub fn site_id(&self, position: usize) -> String {
        self.value(position, ID_COLUMN)
            .map(Value::to_string)
            .unwrap_or_default()
    }

    /// Stable key of the row at `position`.
    pub fn row_key(&self, position: usize) -> Option<RowKey> {
        if position >= self.rows.len() {
            return None;
        }
        let site_id = self.site_id(position);
        let ordinal = (0..position)
            .filter(|&earlier| self.site_id(earlier) == site_id)
            .count();
        Some(RowKey { site_id, ordinal })
    }

    /// Current position of the row with the given key.
    pub fn position_of(&self, key: &RowKey) -> Option<usize> {
        (0..self.rows.len())
            .filter(|&position| self.site_id(position) == key.site_id)
            .nth(key.ordinal)
    }

    /// Seed a draft with the current string form of every editable column.
    pub fn draft_for(&self, key: &RowKey) -> Option<EditDraft> {
        let position = self.position_of(key)?;
        let mut draft = EditDraft::new(key.clone());
        for (column, value) in self.columns.iter().zip(&self.rows[position]) {
            draft.set(column, value.to_string());
        }
        Some(draft)
    }

    /// Write a draft into the row at `position`, in place. Immutable and
    /// unknown columns are skipped. Returns the number of fields written.
    pub fn apply_draft(&mut self, position: usize, draft: &EditDraft) -> usize {
        let mut written = 0;
        for (column, value) in draft.fields() {
            if is_immutable(column) {
                continue;
            }
            let Some(index) = self.column_index(column) else {
                log::warn!("ignoring edit to unknown column {:?}", column);
                continue;
            };
            if let Some(cell) = self.rows.get_mut(position).and_then(|r| r.get_mut(index)) {
                *cell = Value::from_edit(value);
                written += 1;
            }
        }
        written
    }
}
