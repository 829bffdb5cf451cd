//! In-memory worksheet model.
//!
//! A [`Sheet`] is a column-ordered grid of JSON cell values, mirroring what a
//! spreadsheet tab looks like after it has been fetched: one header row and any
//! number of data rows. Cells stay as `serde_json::Value` until they are written
//! back, because the remote store hands back a mix of strings, numbers and
//! empty cells.
//!
//! The five worksheets of the shop workbook and their declared columns live
//! here too ([`Worksheet`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Workbook schema
// ---------------------------------------------------------------------------

/// Fixed shoe size labels; one quantity column per label in the Stock sheet.
pub const SIZE_LABELS: [&str; 10] = [
    "25-26", "27-28", "29-30", "31-32", "33-34", "35-36", "37-38", "39-40", "41-42", "43-44",
];

pub const COL_MODEL: &str = "Model";
pub const COL_DATE: &str = "Date";
pub const COL_CUSTOMER: &str = "Customer";
pub const COL_SUMMARY: &str = "Summary";
pub const COL_TOTAL: &str = "Total";
pub const COL_PAYMENT_STATUS: &str = "PaymentStatus";
pub const COL_NAME: &str = "Name";
pub const COL_STORE: &str = "Store";
pub const COL_CITY: &str = "City";
pub const COL_PHONE: &str = "Phone";
pub const COL_DESCRIPTION: &str = "Description";
pub const COL_VALUE: &str = "Value";
pub const COL_DUE_DATE: &str = "DueDate";

const ORDER_COLUMNS: &[&str] = &[
    COL_DATE,
    COL_CUSTOMER,
    COL_SUMMARY,
    COL_TOTAL,
    COL_PAYMENT_STATUS,
];
const CUSTOMER_COLUMNS: &[&str] = &[COL_NAME, COL_STORE, COL_CITY, COL_PHONE];
const SUPPLY_COLUMNS: &[&str] = &[COL_DATE, COL_DESCRIPTION, COL_VALUE];
const REMINDER_COLUMNS: &[&str] = &[COL_DATE, COL_NAME, COL_DUE_DATE, COL_VALUE];

/// The worksheets (tabs) that make up the shop workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Worksheet {
    Stock,
    Orders,
    Customers,
    Supplies,
    Reminders,
}

impl Worksheet {
    pub const ALL: [Worksheet; 5] = [
        Worksheet::Stock,
        Worksheet::Orders,
        Worksheet::Customers,
        Worksheet::Supplies,
        Worksheet::Reminders,
    ];

    /// Tab name in the remote spreadsheet.
    pub fn name(self) -> &'static str {
        match self {
            Worksheet::Stock => "Stock",
            Worksheet::Orders => "Orders",
            Worksheet::Customers => "Customers",
            Worksheet::Supplies => "Supplies",
            Worksheet::Reminders => "Reminders",
        }
    }

    /// Declared column set, in display order.
    pub fn columns(self) -> Vec<&'static str> {
        match self {
            Worksheet::Stock => {
                let mut cols = Vec::with_capacity(SIZE_LABELS.len() + 1);
                cols.push(COL_MODEL);
                cols.extend(SIZE_LABELS);
                cols
            }
            Worksheet::Orders => ORDER_COLUMNS.to_vec(),
            Worksheet::Customers => CUSTOMER_COLUMNS.to_vec(),
            Worksheet::Supplies => SUPPLY_COLUMNS.to_vec(),
            Worksheet::Reminders => REMINDER_COLUMNS.to_vec(),
        }
    }

    /// Column used for case-insensitive row ordering on load, if any.
    pub fn sort_key(self) -> Option<&'static str> {
        match self {
            Worksheet::Stock => Some(COL_MODEL),
            Worksheet::Customers => Some(COL_NAME),
            _ => None,
        }
    }

    /// Schema-only sheet with zero rows.
    pub fn empty_sheet(self) -> Sheet {
        Sheet::with_columns(self.columns())
    }
}

impl std::fmt::Display for Worksheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

/// Textual form of a cell as a user would read it.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn text_cell(s: impl Into<String>) -> Value {
    Value::String(s.into())
}

fn blank() -> Value {
    Value::String(String::new())
}

// ---------------------------------------------------------------------------
// Sheet
// ---------------------------------------------------------------------------

/// One worksheet held in memory: ordered headers plus ordered rows.
///
/// Every row always has exactly `columns.len()` cells, including sheets
/// deserialized from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSheet")]
pub struct Sheet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawSheet {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl From<RawSheet> for Sheet {
    fn from(raw: RawSheet) -> Self {
        Sheet::from_rows(raw.columns, raw.rows)
    }
}

impl Sheet {
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a sheet from headers and raw rows; short rows are padded with
    /// nulls and long rows truncated.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut sheet = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            sheet.push_row(row);
        }
        sheet
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Cell text, or an empty string when the row or column is missing.
    pub fn text(&self, row: usize, column: &str) -> String {
        self.cell(row, column).map(cell_text).unwrap_or_default()
    }

    /// Overwrite one cell. Returns `false` when the row or column is missing.
    pub fn set_cell(&mut self, row: usize, column: &str, value: Value) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row) {
            Some(r) => {
                r[idx] = value;
                true
            }
            None => false,
        }
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Append a row given as `(column, value)` pairs. Columns not mentioned
    /// are left blank; unknown columns are ignored.
    pub fn push_record(&mut self, record: &[(&str, Value)]) {
        let mut row = vec![blank(); self.columns.len()];
        for (column, value) in record {
            if let Some(idx) = self.column_index(column) {
                row[idx] = value.clone();
            }
        }
        self.rows.push(row);
    }

    pub fn remove_row(&mut self, row: usize) -> Option<Vec<Value>> {
        if row < self.rows.len() {
            Some(self.rows.remove(row))
        } else {
            None
        }
    }

    /// Index of the first row whose `column` text equals `needle` exactly.
    pub fn find_row(&self, column: &str, needle: &str) -> Option<usize> {
        let idx = self.column_index(column)?;
        self.rows.iter().position(|r| cell_text(&r[idx]) == needle)
    }

    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .filter_map(move |r| idx.and_then(|i| r.get(i)))
    }

    /// Drop every column whose name does not satisfy `keep`.
    pub fn retain_columns<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        let keep_mask: Vec<bool> = self.columns.iter().map(|c| keep(c)).collect();
        if keep_mask.iter().all(|k| *k) {
            return;
        }
        let mut mask = keep_mask.iter();
        self.columns.retain(|_| *mask.next().unwrap_or(&true));
        for row in &mut self.rows {
            let mut mask = keep_mask.iter();
            row.retain(|_| *mask.next().unwrap_or(&true));
        }
    }

    pub fn rename_columns<F>(&mut self, mut rename: F)
    where
        F: FnMut(&str) -> String,
    {
        for column in &mut self.columns {
            *column = rename(column);
        }
    }

    /// Append a column, filling every existing row with `fill`.
    pub fn add_column(&mut self, name: impl Into<String>, fill: Value) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    /// Replace every cell in `column` with its textual form.
    pub fn coerce_column_to_text(&mut self, column: &str) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        for row in &mut self.rows {
            let text = cell_text(&row[idx]);
            row[idx] = Value::String(text);
        }
    }

    /// Stable sort of the rows by a key derived from one column.
    pub fn sort_rows_by_key<K, F>(&mut self, column: &str, mut key: F)
    where
        K: Ord,
        F: FnMut(&Value) -> K,
    {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        self.rows.sort_by_key(|r| key(&r[idx]));
    }

    /// Apply `f` to every cell in place.
    pub fn map_cells<F>(&mut self, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                *cell = f(cell);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
