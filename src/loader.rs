//! Workbook loading and the read cache.
//!
//! Every interaction starts by loading all five worksheets. Each fetched sheet
//! is normalized so the rest of the core can rely on its declared columns:
//! placeholder `Unnamed` columns are dropped, headers are trimmed and missing
//! columns are backfilled with blanks. A fetch failure never reaches the
//! caller; the worksheet degrades to an empty schema-only sheet and the
//! failure is recorded in its [`FetchStatus`].
//!
//! Loaded workbooks are memoized in a [`TableCache`] for a short TTL. Writers
//! invalidate it so the next load observes their changes.

use serde_json::Value;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::sheet::{cell_text, Sheet, Worksheet};
use crate::store::SheetStore;

/// Header prefix of positional columns with no name.
pub const UNNAMED_COLUMN_PREFIX: &str = "Unnamed";

/// Default lifetime of a cached workbook snapshot.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Load results
// ---------------------------------------------------------------------------

/// Whether a worksheet came from the store or was substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Fetched,
    /// The read failed; the sheet is an empty schema-only stand-in.
    Unreachable(String),
}

impl FetchStatus {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchStatus::Fetched)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub worksheet: Worksheet,
    pub sheet: Sheet,
    pub status: FetchStatus,
}

/// Snapshot of the whole workbook.
#[derive(Debug, Clone)]
pub struct Workbook {
    entries: Vec<LoadedSheet>,
}

impl Workbook {
    fn entry(&self, worksheet: Worksheet) -> Option<&LoadedSheet> {
        self.entries.iter().find(|e| e.worksheet == worksheet)
    }

    /// The sheet for `worksheet`; schema-only if it was never loaded.
    pub fn sheet(&self, worksheet: Worksheet) -> Sheet {
        self.entry(worksheet)
            .map(|e| e.sheet.clone())
            .unwrap_or_else(|| worksheet.empty_sheet())
    }

    /// The sheet for `worksheet`, or the read error if it degraded to empty.
    /// Writers use this so a failed load never overwrites the remote copy.
    pub fn fetched_sheet(&self, worksheet: Worksheet) -> Result<Sheet, String> {
        match self.status(worksheet) {
            Some(FetchStatus::Unreachable(reason)) => Err(reason.clone()),
            _ => Ok(self.sheet(worksheet)),
        }
    }

    pub fn sheet_ref(&self, worksheet: Worksheet) -> Option<&Sheet> {
        self.entry(worksheet).map(|e| &e.sheet)
    }

    pub fn status(&self, worksheet: Worksheet) -> Option<&FetchStatus> {
        self.entry(worksheet).map(|e| &e.status)
    }

    /// True when every worksheet was actually fetched.
    pub fn is_complete(&self) -> bool {
        Worksheet::ALL
            .iter()
            .all(|ws| self.status(*ws).map(FetchStatus::is_fetched).unwrap_or(false))
    }

    /// Worksheets that degraded to empty, with the read error.
    pub fn unreachable(&self) -> Vec<(Worksheet, String)> {
        self.entries
            .iter()
            .filter_map(|e| match &e.status {
                FetchStatus::Unreachable(err) => Some((e.worksheet, err.clone())),
                FetchStatus::Fetched => None,
            })
            .collect()
    }

    pub fn stock(&self) -> Sheet {
        self.sheet(Worksheet::Stock)
    }

    pub fn orders(&self) -> Sheet {
        self.sheet(Worksheet::Orders)
    }

    pub fn customers(&self) -> Sheet {
        self.sheet(Worksheet::Customers)
    }

    pub fn supplies(&self) -> Sheet {
        self.sheet(Worksheet::Supplies)
    }

    pub fn reminders(&self) -> Sheet {
        self.sheet(Worksheet::Reminders)
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// A single workbook snapshot with an expiry instant.
#[derive(Debug)]
pub struct TableCache {
    ttl: Duration,
    entry: Option<(Instant, Workbook)>,
}

impl TableCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// The cached snapshot, if one exists and has not expired.
    pub fn get(&self) -> Option<&Workbook> {
        match &self.entry {
            Some((expires_at, workbook)) if Instant::now() < *expires_at => Some(workbook),
            _ => None,
        }
    }

    pub fn store(&mut self, workbook: Workbook) {
        self.entry = Some((Instant::now() + self.ttl, workbook));
    }

    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            debug!("workbook cache invalidated");
        }
    }

    pub fn is_warm(&self) -> bool {
        self.get().is_some()
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Bring a fetched sheet in line with the worksheet's declared schema.
pub fn normalize_sheet(mut sheet: Sheet, worksheet: Worksheet) -> Sheet {
    sheet.retain_columns(|name| !name.trim_start().starts_with(UNNAMED_COLUMN_PREFIX));
    sheet.rename_columns(|name| name.trim().to_string());
    // Keep the first of headers that collide once trimmed
    let mut seen = HashSet::new();
    sheet.retain_columns(|name| seen.insert(name.to_string()));

    for column in worksheet.columns() {
        if !sheet.has_column(column) {
            sheet.add_column(column, Value::String(String::new()));
        }
    }

    if let Some(key) = worksheet.sort_key() {
        sheet.coerce_column_to_text(key);
        sheet.sort_rows_by_key(key, |v| cell_text(v).to_lowercase());
    }

    sheet
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Fetch and normalize one worksheet, degrading to an empty sheet on error.
pub async fn load_sheet<S: SheetStore>(store: &S, location: &str, worksheet: Worksheet) -> LoadedSheet {
    match store.read(location, worksheet.name()).await {
        Ok(raw) => LoadedSheet {
            worksheet,
            sheet: normalize_sheet(raw, worksheet),
            status: FetchStatus::Fetched,
        },
        Err(e) => {
            warn!(worksheet = %worksheet, error = %e, "worksheet fetch failed, using empty table");
            LoadedSheet {
                worksheet,
                sheet: worksheet.empty_sheet(),
                status: FetchStatus::Unreachable(e),
            }
        }
    }
}

/// Load all five worksheets straight from the store.
pub async fn load_workbook<S: SheetStore>(store: &S, location: &str) -> Workbook {
    let mut entries = Vec::with_capacity(Worksheet::ALL.len());
    for worksheet in Worksheet::ALL {
        entries.push(load_sheet(store, location, worksheet).await);
    }
    let workbook = Workbook { entries };
    info!(
        stock = workbook.sheet_ref(Worksheet::Stock).map(Sheet::len).unwrap_or(0),
        orders = workbook.sheet_ref(Worksheet::Orders).map(Sheet::len).unwrap_or(0),
        customers = workbook.sheet_ref(Worksheet::Customers).map(Sheet::len).unwrap_or(0),
        reminders = workbook.sheet_ref(Worksheet::Reminders).map(Sheet::len).unwrap_or(0),
        complete = workbook.is_complete(),
        "workbook loaded"
    );
    workbook
}

/// Serve the workbook from `cache` when fresh, otherwise load it.
///
/// Only a complete load is cached; a degraded snapshot is returned but the
/// next call goes back to the store.
pub async fn load_workbook_cached<S: SheetStore>(
    store: &S,
    location: &str,
    cache: &mut TableCache,
) -> Workbook {
    if let Some(workbook) = cache.get() {
        debug!("workbook served from cache");
        return workbook.clone();
    }
    let workbook = load_workbook(store, location).await;
    if workbook.is_complete() {
        cache.store(workbook.clone());
    }
    workbook
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{text_row, FlakyStore};
    use serde_json::json;

    const LOC: &str = "test-book";

    #[test]
    fn test_normalize_drops_unnamed_and_trims_headers() {
        let raw = Sheet::from_rows(
            vec![" Name ".into(), "Unnamed: 1".into(), "City".into()],
            vec![text_row(&["Ana", "x", "Recife"])],
        );
        let sheet = normalize_sheet(raw, Worksheet::Customers);
        assert_eq!(sheet.columns(), &["Name", "City", "Store", "Phone"]);
        assert_eq!(sheet.text(0, "Name"), "Ana");
        assert_eq!(sheet.text(0, "City"), "Recife");
    }

    #[test]
    fn test_headers_equal_after_trim_keep_first() {
        let raw = Sheet::from_rows(
            vec!["Model".into(), "25-26".into(), " Model ".into()],
            vec![text_row(&["Chinelo X", "4", "stale"])],
        );
        let sheet = normalize_sheet(raw, Worksheet::Stock);
        assert_eq!(sheet.columns().iter().filter(|c| *c == "Model").count(), 1);
        assert_eq!(sheet.text(0, "Model"), "Chinelo X");
        assert_eq!(sheet.text(0, "25-26"), "4");
    }

    #[test]
    fn test_missing_declared_column_is_backfilled_blank() {
        let raw = Sheet::from_rows(
            vec!["Date".into(), "Customer".into(), "Summary".into(), "Total".into()],
            vec![
                text_row(&["01/02/2024 10:00", "Ana", "A(25-26x1)", "10,00"]),
                text_row(&["02/02/2024 11:00", "Bia", "B(27-28x1)", "20,00"]),
            ],
        );
        let sheet = normalize_sheet(raw, Worksheet::Orders);
        assert!(sheet.has_column("PaymentStatus"));
        for row in 0..sheet.len() {
            assert_eq!(sheet.cell(row, "PaymentStatus"), Some(&json!("")));
        }
    }

    #[test]
    fn test_stock_sorted_case_insensitively() {
        let raw = Sheet::from_rows(
            vec!["Model".into(), "25-26".into()],
            vec![text_row(&["b", "1"]), text_row(&["A", "2"]), text_row(&["c", "3"])],
        );
        let sheet = normalize_sheet(raw, Worksheet::Stock);
        let models: Vec<String> = (0..sheet.len()).map(|r| sheet.text(r, "Model")).collect();
        assert_eq!(models, vec!["A", "b", "c"]);
        assert_eq!(sheet.text(0, "25-26"), "2");
    }

    #[test]
    fn test_numeric_model_names_become_text() {
        let raw = Sheet::from_rows(vec!["Model".into()], vec![vec![json!(42)]]);
        let sheet = normalize_sheet(raw, Worksheet::Stock);
        assert_eq!(sheet.cell(0, "Model"), Some(&json!("42")));
    }

    #[test]
    fn test_orders_keep_insertion_order() {
        let raw = Sheet::from_rows(
            vec!["Customer".into()],
            vec![text_row(&["zeca"]), text_row(&["Ana"])],
        );
        let sheet = normalize_sheet(raw, Worksheet::Orders);
        assert_eq!(sheet.text(0, "Customer"), "zeca");
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_schema_only_sheet() {
        let store = FlakyStore::seeded_empty(LOC).await;
        store.fail_reads_of("Reminders");
        let workbook = load_workbook(&store, LOC).await;

        let reminders = workbook.reminders();
        assert!(reminders.is_empty());
        assert_eq!(reminders.columns(), &["Date", "Name", "DueDate", "Value"]);
        assert!(matches!(
            workbook.status(Worksheet::Reminders),
            Some(FetchStatus::Unreachable(_))
        ));
        assert!(!workbook.is_complete());
        assert_eq!(workbook.unreachable().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_serves_until_invalidated() {
        let store = FlakyStore::seeded_empty(LOC).await;
        let mut cache = TableCache::new(Duration::from_secs(60));

        load_workbook_cached(&store, LOC, &mut cache).await;
        let reads_after_first = store.reads();
        assert_eq!(reads_after_first, 5);

        load_workbook_cached(&store, LOC, &mut cache).await;
        assert_eq!(store.reads(), reads_after_first);

        cache.invalidate();
        load_workbook_cached(&store, LOC, &mut cache).await;
        assert_eq!(store.reads(), reads_after_first + 5);
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let store = FlakyStore::seeded_empty(LOC).await;
        let mut cache = TableCache::new(Duration::from_millis(20));

        load_workbook_cached(&store, LOC, &mut cache).await;
        assert!(cache.is_warm());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cache.is_warm());

        load_workbook_cached(&store, LOC, &mut cache).await;
        assert_eq!(store.reads(), 10);
    }

    #[tokio::test]
    async fn test_degraded_workbook_is_not_cached() {
        let store = FlakyStore::seeded_empty(LOC).await;
        store.fail_reads_of("Stock");
        let mut cache = TableCache::new(Duration::from_secs(60));

        load_workbook_cached(&store, LOC, &mut cache).await;
        assert!(!cache.is_warm());

        store.clear_failures();
        let workbook = load_workbook_cached(&store, LOC, &mut cache).await;
        assert!(workbook.is_complete());
        assert!(cache.is_warm());
    }
}
