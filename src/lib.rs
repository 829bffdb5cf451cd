//! Shoe Stock - dashboard core
//!
//! Stock levels per model and size, cart checkout, customers, payment
//! tracking and reminders for a small footwear shop. All data lives in a
//! spreadsheet workbook; this crate loads it, caches it briefly, and writes
//! whole worksheets back. A presentation layer holds a [`Dashboard`] and
//! calls its operations.

use anyhow::Context as _;
use clap::Parser as _;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod alerts;
pub mod api;
pub mod cli;
pub mod core_helpers;
pub mod dashboard;
pub mod db;
pub mod diagnostics;
pub mod forms;
pub mod loader;
pub mod local_store;
pub mod numeric;
pub mod sales;
pub mod settings;
pub mod sheet;
pub mod storage;
pub mod store;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use alerts::{ActiveReminder, DashboardSummary, LowStockAlert, OutstandingPayment};
pub use api::GoogleSheetsStore;
pub use dashboard::Dashboard;
pub use forms::NewCustomer;
pub use loader::{FetchStatus, TableCache, Workbook};
pub use local_store::LocalWorkbook;
pub use sales::{Cart, CartItem, CheckoutError, CheckoutReceipt, PaymentStatus};
pub use settings::DashboardSettings;
pub use sheet::{Sheet, Worksheet};
pub use store::SheetStore;

/// Workbook location used when no spreadsheet is configured and the
/// dashboard runs against the local SQLite workbook.
const LOCAL_LOCATION: &str = "local";

fn init_logging(data_dir: &Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shoe_stock_lib=debug"));

    // Prune before the appender opens today's file
    let log_dir = diagnostics::get_log_dir(data_dir);
    diagnostics::prune_old_logs(&log_dir);
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // The process logs until exit; dropping the guard would stop the writer.
    std::mem::forget(guard);
}

/// Log everything a shop operator sees on the landing screen.
async fn report<S: SheetStore>(dashboard: &mut Dashboard<S>) {
    let workbook = dashboard.sync().await;
    info!(location = %dashboard.location(), "workbook synced");
    for (worksheet, error) in workbook.unreachable() {
        warn!(worksheet = %worksheet, %error, "worksheet unavailable, showing empty table");
    }
    info!(health = %diagnostics::workbook_health(&workbook), "workbook status");

    for alert in dashboard.low_stock().await {
        warn!("Low stock: {alert}");
    }
    for payment in dashboard.outstanding_payments().await {
        info!(
            customer = %payment.customer,
            total = payment.total,
            status = %payment.status,
            date = %payment.date,
            "payment outstanding"
        );
    }
    for reminder in dashboard.active_reminders().await {
        info!(
            title = %reminder.title,
            due = %reminder.due_date,
            value = reminder.value,
            "reminder"
        );
    }

    let summary = dashboard.summary().await;
    info!(
        pairs = summary.total_pairs,
        models = summary.models,
        gross_sales = summary.gross_sales,
        outstanding = summary.outstanding_amount,
        low_stock = summary.low_stock_alerts,
        reminders = summary.active_reminders,
        "dashboard summary"
    );
}

// ============================================================================
// Entry point
// ============================================================================

/// Parse the command line and run it. `login`/`logout` manage the stored
/// Sheets credentials; the default command syncs the workbook once and logs
/// the dashboard.
pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating data dir {}", cli.data_dir.display()))?;

    init_logging(&cli.data_dir);
    info!(about = %diagnostics::get_about_info(), "Starting Shoe Stock");

    match cli.command() {
        cli::Command::Login { token, spreadsheet } => {
            let credentials = storage::update_credentials(&storage::Keyring, &token, spreadsheet.as_deref())
                .map_err(anyhow::Error::msg)?;
            info!(spreadsheet = ?credentials.spreadsheet, "logged in to Google Sheets");
            Ok(())
        }
        cli::Command::Logout => {
            storage::factory_reset(&storage::Keyring).map_err(anyhow::Error::msg)?;
            info!("logged out, the local workbook will be used");
            Ok(())
        }
        cli::Command::Report => report_once(&cli.data_dir),
    }
}

fn report_once(data_dir: &Path) -> anyhow::Result<()> {
    let db_state = db::init(data_dir).map_err(anyhow::Error::msg)?;
    let settings = {
        let conn = db_state
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("database lock poisoned: {e}"))?;
        DashboardSettings::load(&conn)
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    match storage::load_credentials(&storage::Keyring) {
        Some(credentials) => {
            let location = credentials
                .spreadsheet
                .or_else(|| settings.spreadsheet.clone())
                .context("no spreadsheet configured")?;
            let store = GoogleSheetsStore::new(&settings.sheets_api_url, &credentials.access_token)
                .map_err(anyhow::Error::msg)?;
            info!(%location, "using Google Sheets workbook");
            let mut dashboard = Dashboard::new(store, location, settings);
            runtime.block_on(report(&mut dashboard));
        }
        None => {
            info!(db = %db_state.db_path.display(), "no sheets token stored, using local workbook");
            let store = LocalWorkbook::new(db_state);
            let created = store
                .ensure_workbook(LOCAL_LOCATION)
                .map_err(anyhow::Error::msg)?;
            if created > 0 {
                info!(created, "created empty local worksheets");
            }
            let mut dashboard = Dashboard::new(store, LOCAL_LOCATION, settings);
            runtime.block_on(report(&mut dashboard));
        }
    }

    Ok(())
}
