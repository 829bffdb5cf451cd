//! Shared fixtures for unit tests.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::dashboard::Dashboard;
use crate::local_store::LocalWorkbook;
use crate::settings::DashboardSettings;
use crate::sheet::{Sheet, Worksheet};
use crate::store::SheetStore;

/// In-memory workbook that counts calls and fails on demand.
pub struct FlakyStore {
    inner: LocalWorkbook,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: LocalWorkbook::in_memory().expect("in-memory workbook"),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            failing_reads: Mutex::new(HashSet::new()),
            failing_writes: Mutex::new(HashSet::new()),
        }
    }

    /// Store with all five worksheets present and empty.
    pub async fn seeded_empty(location: &str) -> Self {
        let store = Self::new();
        store.inner.ensure_workbook(location).expect("seed empty workbook");
        store
    }

    pub fn fail_reads_of(&self, worksheet: &str) {
        self.failing_reads.lock().unwrap().insert(worksheet.to_string());
    }

    pub fn fail_writes_of(&self, worksheet: &str) {
        self.failing_writes.lock().unwrap().insert(worksheet.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_reads.lock().unwrap().clear();
        self.failing_writes.lock().unwrap().clear();
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SheetStore for FlakyStore {
    async fn read(&self, location: &str, worksheet: &str) -> Result<Sheet, String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.lock().unwrap().contains(worksheet) {
            return Err(format!("injected read failure for {worksheet}"));
        }
        self.inner.read(location, worksheet).await
    }

    async fn write(&self, location: &str, worksheet: &str, sheet: &Sheet) -> Result<(), String> {
        if self.failing_writes.lock().unwrap().contains(worksheet) {
            return Err(format!("injected write failure for {worksheet}"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(location, worksheet, sheet).await
    }
}

/// Put a worksheet straight into the backing store, bypassing counters.
pub async fn seed(store: &FlakyStore, location: &str, worksheet: Worksheet, sheet: &Sheet) {
    store
        .inner
        .write(location, worksheet.name(), sheet)
        .await
        .expect("seed worksheet");
}

pub fn text_row(cells: &[&str]) -> Vec<Value> {
    cells.iter().map(|c| Value::String(c.to_string())).collect()
}

/// Settings with no settle delay and a long cache TTL.
pub fn test_settings() -> DashboardSettings {
    DashboardSettings {
        settle_delay: Duration::ZERO,
        cache_ttl: Duration::from_secs(60),
        ..DashboardSettings::default()
    }
}

pub fn dashboard_with(store: FlakyStore, location: &str) -> Dashboard<FlakyStore> {
    Dashboard::new(store, location, test_settings())
}
