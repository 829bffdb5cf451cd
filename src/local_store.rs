//! SQLite-backed workbook.
//!
//! Implements [`SheetStore`] over the `worksheets` table so the dashboard can
//! run against a local file during development, and so tests have a real
//! store to round-trip through. Each worksheet is one row holding its headers
//! and cells as JSON; a write replaces the whole row.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use crate::db::DbState;
use crate::sheet::{Sheet, Worksheet};
use crate::store::SheetStore;

pub struct LocalWorkbook {
    db: DbState,
}

impl LocalWorkbook {
    pub fn new(db: DbState) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Result<Self, String> {
        Ok(Self::new(crate::db::open_in_memory()?))
    }

    /// Names of the worksheets stored under `location`.
    pub fn worksheet_names(&self, location: &str) -> Result<Vec<String>, String> {
        let conn = self.db.conn.lock().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare("SELECT name FROM worksheets WHERE location = ?1 ORDER BY name")
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map(params![location], |row| row.get::<_, String>(0))
            .map_err(|e| e.to_string())?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Create any of the five worksheets missing under `location` as empty
    /// schema-only tables. Returns how many were created.
    pub fn ensure_workbook(&self, location: &str) -> Result<usize, String> {
        let existing = self.worksheet_names(location)?;
        let mut created = 0;
        for worksheet in Worksheet::ALL {
            if !existing.iter().any(|n| n == worksheet.name()) {
                self.write_sync(location, worksheet.name(), &worksheet.empty_sheet())?;
                created += 1;
            }
        }
        Ok(created)
    }

    fn read_sync(&self, location: &str, worksheet: &str) -> Result<Sheet, String> {
        let conn = self.db.conn.lock().map_err(|e| e.to_string())?;
        let stored: Option<(String, String)> = conn
            .query_row(
                "SELECT columns, rows FROM worksheets WHERE location = ?1 AND name = ?2",
                params![location, worksheet],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| format!("read worksheet: {e}"))?;
        let (columns_json, rows_json) =
            stored.ok_or_else(|| format!("Worksheet not found: {worksheet}"))?;

        let columns: Vec<String> = serde_json::from_str(&columns_json)
            .map_err(|e| format!("parse columns of {worksheet}: {e}"))?;
        let rows: Vec<Vec<Value>> = serde_json::from_str(&rows_json)
            .map_err(|e| format!("parse rows of {worksheet}: {e}"))?;
        Ok(Sheet::from_rows(columns, rows))
    }

    fn write_sync(&self, location: &str, worksheet: &str, sheet: &Sheet) -> Result<(), String> {
        let columns_json =
            serde_json::to_string(sheet.columns()).map_err(|e| format!("serialize columns: {e}"))?;
        let rows_json =
            serde_json::to_string(sheet.rows()).map_err(|e| format!("serialize rows: {e}"))?;

        let conn = self.db.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO worksheets (location, name, columns, rows, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(location, name) DO UPDATE SET
                columns = excluded.columns,
                rows = excluded.rows,
                updated_at = excluded.updated_at",
            params![location, worksheet, columns_json, rows_json],
        )
        .map_err(|e| format!("write worksheet: {e}"))?;
        debug!(location, worksheet, rows = sheet.len(), "local worksheet written");
        Ok(())
    }
}

impl SheetStore for LocalWorkbook {
    async fn read(&self, location: &str, worksheet: &str) -> Result<Sheet, String> {
        self.read_sync(location, worksheet)
    }

    async fn write(&self, location: &str, worksheet: &str, sheet: &Sheet) -> Result<(), String> {
        self.write_sync(location, worksheet, sheet)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
