//! Remote table store seam.
//!
//! The core only ever needs two calls against the spreadsheet: read a whole
//! worksheet and overwrite a whole worksheet. Adapters: [`crate::api`] talks
//! to the Google Sheets values API, [`crate::local_store`] keeps a workbook
//! in SQLite.

use crate::sheet::Sheet;

/// A spreadsheet-like backend addressed by `(location, worksheet)`.
///
/// `location` identifies the workbook (a spreadsheet URL or id, or any key
/// the adapter understands). Blank header cells must be reported as
/// `Unnamed: {index}` columns so the loader can drop them.
#[allow(async_fn_in_trait)]
pub trait SheetStore {
    async fn read(&self, location: &str, worksheet: &str) -> Result<Sheet, String>;

    /// Replace the worksheet's entire contents with `sheet`.
    async fn write(&self, location: &str, worksheet: &str, sheet: &Sheet) -> Result<(), String>;
}

/// Header name given to a blank header cell at `index`.
pub fn unnamed_header(index: usize) -> String {
    format!("Unnamed: {index}")
}
