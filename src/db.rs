//! Local SQLite database.
//!
//! Holds the dashboard's local settings and, for the local workbook backend,
//! the worksheets themselves. Uses rusqlite with WAL mode and a small
//! versioned migration chain.

use rusqlite::{params, Connection, ErrorCode};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Shared handle to the open database.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

const DB_FILE: &str = "dashboard.db";

/// How long a connection waits on another session's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize the database at `{data_dir}/dashboard.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. A file SQLite reports as corrupt or not
/// a database is moved aside to `dashboard.db.corrupt` and a fresh one is
/// created; any other failure (locked by another session, I/O) is returned
/// and the file is left alone.
pub fn init(data_dir: &Path) -> Result<DbState, String> {
    init_with_timeout(data_dir, BUSY_TIMEOUT)
}

fn init_with_timeout(data_dir: &Path, busy_timeout: Duration) -> Result<DbState, String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;

    let db_path = data_dir.join(DB_FILE);
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path, busy_timeout) {
        Ok(c) => c,
        Err(e) if is_corruption(&e) => {
            let aside = db_path.with_extension("db.corrupt");
            warn!(
                "Database at {} is unreadable ({e}), moving it to {} and starting fresh",
                db_path.display(),
                aside.display()
            );
            fs::rename(&db_path, &aside)
                .map_err(|err| format!("Failed to move corrupt database aside: {err}"))?;
            let _ = fs::remove_file(db_path.with_extension("db-wal"));
            let _ = fs::remove_file(db_path.with_extension("db-shm"));
            open_and_configure(&db_path, busy_timeout)
                .map_err(|e| format!("Database open failed after recovery: {e}"))?
        }
        Err(e) => return Err(format!("Database open failed: {e}")),
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// In-memory database with all migrations applied.
pub fn open_in_memory() -> Result<DbState, String> {
    let conn = Connection::open_in_memory().map_err(|e| format!("sqlite open: {e}"))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| format!("pragma setup: {e}"))?;
    run_migrations(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

fn is_corruption(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase)
    )
}

fn open_and_configure(path: &Path, busy_timeout: Duration) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    // Before WAL: switching journal mode needs a lock another session may hold.
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Migration v1: local settings.
fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS local_settings (
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (setting_category, setting_key)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| format!("migrate v1: {e}"))?;
    info!("Applied migration v1");
    Ok(())
}

/// Migration v2: worksheets of the local workbook backend.
fn migrate_v2(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS worksheets (
            location TEXT NOT NULL,
            name TEXT NOT NULL,
            columns TEXT NOT NULL DEFAULT '[]',
            rows TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (location, name)
        );

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| format!("migrate v2: {e}"))?;
    info!("Applied migration v2");
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Read a single setting value.
pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .ok()
}

/// Insert or update a setting.
pub fn set_setting(conn: &Connection, category: &str, key: &str, value: &str) -> Result<(), String> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )
    .map_err(|e| format!("set_setting: {e}"))?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, category: &str, key: &str) -> Result<(), String> {
    conn.execute(
        "DELETE FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
    )
    .map_err(|e| format!("delete_setting: {e}"))?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare table list");
        stmt.query_map([], |row| row.get(0))
            .expect("query tables")
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_migrations_create_tables() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        let names = table_names(&conn);
        assert!(names.contains(&"local_settings".to_string()));
        assert!(names.contains(&"worksheets".to_string()));
        assert!(names.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        run_migrations(&conn).expect("second run");
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_setting_upsert_and_delete() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        assert_eq!(get_setting(&conn, "dashboard", "low_stock_threshold"), None);

        set_setting(&conn, "dashboard", "low_stock_threshold", "5").unwrap();
        set_setting(&conn, "dashboard", "low_stock_threshold", "3").unwrap();
        assert_eq!(
            get_setting(&conn, "dashboard", "low_stock_threshold").as_deref(),
            Some("3")
        );

        delete_setting(&conn, "dashboard", "low_stock_threshold").unwrap();
        assert_eq!(get_setting(&conn, "dashboard", "low_stock_threshold"), None);
    }

    #[test]
    fn test_init_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = init(dir.path()).expect("init");
        assert!(db.db_path.ends_with(DB_FILE));
        assert!(db.db_path.exists());
    }

    fn worksheet_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM worksheets", [], |row| row.get(0))
            .expect("count worksheets")
    }

    #[test]
    fn test_locked_database_is_reported_not_wiped() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = init(dir.path()).expect("first init");
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO worksheets (location, name) VALUES ('local', 'Stock')",
                [],
            )
            .unwrap();
        }

        let holder = Connection::open(dir.path().join(DB_FILE)).unwrap();
        holder
            .execute_batch("PRAGMA locking_mode = EXCLUSIVE; BEGIN EXCLUSIVE;")
            .unwrap();

        assert!(init_with_timeout(dir.path(), Duration::from_millis(50)).is_err());

        holder.execute_batch("COMMIT;").unwrap();
        drop(holder);

        let db = init(dir.path()).expect("reopen after lock released");
        assert_eq!(worksheet_count(&db.conn.lock().unwrap()), 1);
        assert!(!dir.path().join("dashboard.db.corrupt").exists());
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(DB_FILE), vec![b'x'; 4096]).unwrap();

        let db = init(dir.path()).expect("init over garbage file");
        assert_eq!(worksheet_count(&db.conn.lock().unwrap()), 0);
        assert!(dir.path().join("dashboard.db.corrupt").exists());
    }
}
