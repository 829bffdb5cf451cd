//! Persistence writer.
//!
//! Writes are always full-worksheet overwrites. Before sending, every cell is
//! coerced to text and null markers produced by spreadsheet/dataframe tooling
//! are blanked so they never get persisted as literal text.
//!
//! The store's read path can lag behind a write, so a successful write is
//! followed by a fixed settle delay before control returns to the caller.

use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::loader::TableCache;
use crate::sheet::{cell_text, Sheet, Worksheet};
use crate::store::SheetStore;

/// Textual sentinels for empty cells that must not be written back.
pub const NULL_MARKERS: &[&str] = &["nan", "NaN", "None", "null", "<NA>", "NaT"];

/// Default pause after a successful write.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2500);

pub fn is_null_marker(text: &str) -> bool {
    NULL_MARKERS.contains(&text)
}

/// Copy of `sheet` with every cell as text and null markers blanked.
pub fn prepare_for_write(sheet: &Sheet) -> Sheet {
    let mut out = sheet.clone();
    out.map_cells(|cell| {
        let text = cell_text(cell);
        if is_null_marker(&text) {
            Value::String(String::new())
        } else {
            Value::String(text)
        }
    });
    out
}

/// Overwrite `worksheet` with `sheet`.
///
/// On success the cache is invalidated and the settle delay is awaited. On
/// failure the cache is left alone and the error is returned for the caller
/// to show.
pub async fn write_sheet<S: SheetStore>(
    store: &S,
    location: &str,
    worksheet: Worksheet,
    sheet: &Sheet,
    cache: &mut TableCache,
    settle_delay: Duration,
) -> Result<(), String> {
    let prepared = prepare_for_write(sheet);
    if let Err(e) = store.write(location, worksheet.name(), &prepared).await {
        error!(worksheet = %worksheet, error = %e, "worksheet write failed");
        return Err(format!("Failed to save {worksheet}: {e}"));
    }

    cache.invalidate();
    info!(
        worksheet = %worksheet,
        rows = prepared.len(),
        settle_ms = settle_delay.as_millis() as u64,
        "worksheet saved"
    );
    if !settle_delay.is_zero() {
        tokio::time::sleep(settle_delay).await;
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
