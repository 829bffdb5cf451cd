//! Diagnostics: about info, per-worksheet health and log file rotation.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::loader::{FetchStatus, Workbook};
use crate::sheet::Worksheet;

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// File name prefix of the rolling log (`dashboard.2024-05-10`, ...).
pub const LOG_FILE_PREFIX: &str = "dashboard";

pub fn get_about_info() -> Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "rustVersion": env!("CARGO_PKG_RUST_VERSION"),
    })
}

/// Row count and fetch status of every worksheet in a loaded workbook.
pub fn workbook_health(workbook: &Workbook) -> Value {
    let worksheets: Vec<Value> = Worksheet::ALL
        .iter()
        .map(|ws| {
            let rows = workbook.sheet_ref(*ws).map(|s| s.len()).unwrap_or(0);
            let (reachable, error) = match workbook.status(*ws) {
                Some(FetchStatus::Fetched) => (true, None),
                Some(FetchStatus::Unreachable(e)) => (false, Some(e.clone())),
                None => (false, Some("not loaded".to_string())),
            };
            json!({
                "worksheet": ws.name(),
                "rows": rows,
                "reachable": reachable,
                "error": error,
            })
        })
        .collect();

    json!({
        "complete": workbook.is_complete(),
        "worksheets": worksheets,
    })
}

// ---------------------------------------------------------------------------
// Log rotation
// ---------------------------------------------------------------------------

pub fn get_log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Prune old log files, keeping only the most recent `MAX_LOG_FILES`.
/// Returns how many files were removed.
pub fn prune_old_logs(log_dir: &Path) -> usize {
    if !log_dir.exists() {
        return 0;
    }

    let mut log_files: Vec<(PathBuf, SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
            if is_log {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first; ties broken by name so dated files keep their order.
    log_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to prune log file {}: {e}", path.display()),
        }
    }
    removed
}
