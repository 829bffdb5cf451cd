//! Dashboard configuration stored in `local_settings` (category `dashboard`).
//!
//! Every knob has a default; missing or unparseable values fall back to it
//! with a warning rather than failing start-up.

use rusqlite::Connection;
use std::time::Duration;
use tracing::warn;

use crate::api::DEFAULT_SHEETS_API_URL;
use crate::db;
use crate::loader::DEFAULT_CACHE_TTL;
use crate::writer::DEFAULT_SETTLE_DELAY;

pub const SETTINGS_CATEGORY: &str = "dashboard";

pub const KEY_SPREADSHEET: &str = "spreadsheet";
pub const KEY_SHEETS_API_URL: &str = "sheets_api_url";
pub const KEY_LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";
pub const KEY_SETTLE_DELAY_MS: &str = "settle_delay_ms";
pub const KEY_CACHE_TTL_SECS: &str = "cache_ttl_secs";

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    /// Spreadsheet URL or id. `None` until configured.
    pub spreadsheet: Option<String>,
    pub sheets_api_url: String,
    /// Quantities strictly below this raise a low-stock alert.
    pub low_stock_threshold: i64,
    pub settle_delay: Duration,
    pub cache_ttl: Duration,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            spreadsheet: None,
            sheets_api_url: DEFAULT_SHEETS_API_URL.to_string(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            settle_delay: DEFAULT_SETTLE_DELAY,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

fn parse_setting<T: std::str::FromStr>(conn: &Connection, key: &str) -> Option<T> {
    let raw = db::get_setting(conn, SETTINGS_CATEGORY, key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable dashboard setting");
            None
        }
    }
}

impl DashboardSettings {
    pub fn load(conn: &Connection) -> Self {
        let defaults = Self::default();
        Self {
            spreadsheet: db::get_setting(conn, SETTINGS_CATEGORY, KEY_SPREADSHEET)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            sheets_api_url: db::get_setting(conn, SETTINGS_CATEGORY, KEY_SHEETS_API_URL)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.sheets_api_url),
            low_stock_threshold: parse_setting(conn, KEY_LOW_STOCK_THRESHOLD)
                .unwrap_or(defaults.low_stock_threshold),
            settle_delay: parse_setting::<u64>(conn, KEY_SETTLE_DELAY_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            cache_ttl: parse_setting::<u64>(conn, KEY_CACHE_TTL_SECS)
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
        }
    }

    pub fn save(&self, conn: &Connection) -> Result<(), String> {
        match &self.spreadsheet {
            Some(s) => db::set_setting(conn, SETTINGS_CATEGORY, KEY_SPREADSHEET, s)?,
            None => db::delete_setting(conn, SETTINGS_CATEGORY, KEY_SPREADSHEET)?,
        }
        db::set_setting(conn, SETTINGS_CATEGORY, KEY_SHEETS_API_URL, &self.sheets_api_url)?;
        db::set_setting(
            conn,
            SETTINGS_CATEGORY,
            KEY_LOW_STOCK_THRESHOLD,
            &self.low_stock_threshold.to_string(),
        )?;
        db::set_setting(
            conn,
            SETTINGS_CATEGORY,
            KEY_SETTLE_DELAY_MS,
            &self.settle_delay.as_millis().to_string(),
        )?;
        db::set_setting(
            conn,
            SETTINGS_CATEGORY,
            KEY_CACHE_TTL_SECS,
            &self.cache_ttl.as_secs().to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_stored() {
        let db = db::open_in_memory().unwrap();
        let conn = db.conn.lock().unwrap();
        let settings = DashboardSettings::load(&conn);
        assert_eq!(settings, DashboardSettings::default());
        assert_eq!(settings.low_stock_threshold, 5);
        assert_eq!(settings.settle_delay, Duration::from_millis(2500));
        assert_eq!(settings.cache_ttl, Duration::from_secs(10));
    }

    #[test]
    fn test_save_then_load() {
        let db = db::open_in_memory().unwrap();
        let conn = db.conn.lock().unwrap();
        let settings = DashboardSettings {
            spreadsheet: Some("1AbC".into()),
            sheets_api_url: "http://localhost:9000".into(),
            low_stock_threshold: 3,
            settle_delay: Duration::from_millis(500),
            cache_ttl: Duration::from_secs(30),
        };
        settings.save(&conn).unwrap();
        assert_eq!(DashboardSettings::load(&conn), settings);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let db = db::open_in_memory().unwrap();
        let conn = db.conn.lock().unwrap();
        db::set_setting(&conn, SETTINGS_CATEGORY, KEY_LOW_STOCK_THRESHOLD, "lots").unwrap();
        db::set_setting(&conn, SETTINGS_CATEGORY, KEY_SPREADSHEET, "   ").unwrap();
        let settings = DashboardSettings::load(&conn);
        assert_eq!(settings.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(settings.spreadsheet, None);
    }
}
