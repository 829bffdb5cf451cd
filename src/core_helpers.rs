use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Display format for every timestamp the core writes (`DD/MM/YYYY HH:MM`).
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// The shop runs on UTC-03:00 regardless of the host clock's zone.
const SHOP_UTC_OFFSET_WEST_SECS: i32 = 3 * 3600;

pub fn shop_offset() -> FixedOffset {
    FixedOffset::west_opt(SHOP_UTC_OFFSET_WEST_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn display_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&shop_offset())
        .format(DISPLAY_TIMESTAMP_FORMAT)
        .to_string()
}

/// Lowercased, trimmed status text for comparisons.
pub fn normalize_status(status: &str) -> String {
    status.trim().to_lowercase()
}

/// Trim a form field, treating whitespace-only input as absent.
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
