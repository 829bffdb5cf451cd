//! The dashboard: store, workbook location, read cache and settings in one
//! place. This is what a presentation layer holds on to; the operations
//! themselves live in [`crate::sales`], [`crate::forms`] and
//! [`crate::alerts`].

use tracing::info;

use crate::loader::{load_workbook, load_workbook_cached, TableCache, Workbook};
use crate::settings::DashboardSettings;
use crate::sheet::{Sheet, Worksheet};
use crate::store::SheetStore;
use crate::writer::write_sheet;

pub struct Dashboard<S> {
    store: S,
    location: String,
    cache: TableCache,
    settings: DashboardSettings,
}

impl<S: SheetStore> Dashboard<S> {
    pub fn new(store: S, location: impl Into<String>, settings: DashboardSettings) -> Self {
        Self {
            store,
            location: location.into(),
            cache: TableCache::new(settings.cache_ttl),
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    /// Current workbook, from cache when fresh.
    pub async fn workbook(&mut self) -> Workbook {
        load_workbook_cached(&self.store, &self.location, &mut self.cache).await
    }

    /// Drop the cache and reload everything from the store.
    pub async fn sync(&mut self) -> Workbook {
        info!(location = %self.location, "manual sync requested");
        self.cache.invalidate();
        let workbook = load_workbook(&self.store, &self.location).await;
        if workbook.is_complete() {
            self.cache.store(workbook.clone());
        }
        workbook
    }

    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    /// Overwrite one worksheet in full; see [`write_sheet`].
    pub async fn save(&mut self, worksheet: Worksheet, sheet: &Sheet) -> Result<(), String> {
        write_sheet(
            &self.store,
            &self.location,
            worksheet,
            sheet,
            &mut self.cache,
            self.settings.settle_delay,
        )
        .await
    }
}
