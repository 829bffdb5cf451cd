//! Read-only views derived from the workbook: low stock, money still owed,
//! reminders, and the headline summary.

use serde::Serialize;

use crate::dashboard::Dashboard;
use crate::loader::Workbook;
use crate::numeric::to_number;
use crate::sales::PaymentStatus;
use crate::sheet::{
    Sheet, COL_CUSTOMER, COL_DATE, COL_DUE_DATE, COL_MODEL, COL_NAME, COL_PAYMENT_STATUS,
    COL_TOTAL, COL_VALUE, SIZE_LABELS,
};
use crate::store::SheetStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockAlert {
    pub model: String,
    pub size: String,
    pub quantity: f64,
}

impl std::fmt::Display for LowStockAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {} units", self.model, self.size, self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingPayment {
    pub customer: String,
    pub total: f64,
    pub status: PaymentStatus,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveReminder {
    pub title: String,
    pub due_date: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_pairs: f64,
    pub models: usize,
    pub gross_sales: f64,
    pub outstanding_amount: f64,
    pub low_stock_alerts: usize,
    pub active_reminders: usize,
}

/// Every (model, size) whose quantity is under `threshold`. Negative
/// quantities left behind by oversold checkouts are included.
pub fn low_stock(stock: &Sheet, threshold: i64) -> Vec<LowStockAlert> {
    let threshold = threshold as f64;
    let mut alerts = Vec::new();
    for row in 0..stock.len() {
        let model = stock.text(row, COL_MODEL);
        for size in SIZE_LABELS {
            let quantity = to_number(stock.cell(row, size));
            if quantity < threshold {
                alerts.push(LowStockAlert {
                    model: model.clone(),
                    size: size.to_string(),
                    quantity,
                });
            }
        }
    }
    alerts
}

pub fn outstanding_payments(orders: &Sheet) -> Vec<OutstandingPayment> {
    (0..orders.len())
        .filter_map(|row| {
            let status = PaymentStatus::parse(&orders.text(row, COL_PAYMENT_STATUS))?;
            status.is_outstanding().then(|| OutstandingPayment {
                customer: orders.text(row, COL_CUSTOMER),
                total: to_number(orders.cell(row, COL_TOTAL)),
                status,
                date: orders.text(row, COL_DATE),
            })
        })
        .collect()
}

/// Reminders with a title, in sheet order. There is no expiry.
pub fn active_reminders(reminders: &Sheet) -> Vec<ActiveReminder> {
    (0..reminders.len())
        .filter_map(|row| {
            let title = reminders.text(row, COL_NAME);
            if title.trim().is_empty() {
                return None;
            }
            Some(ActiveReminder {
                title,
                due_date: reminders.text(row, COL_DUE_DATE),
                value: to_number(reminders.cell(row, COL_VALUE)),
            })
        })
        .collect()
}

pub fn summarize(workbook: &Workbook, low_stock_threshold: i64) -> DashboardSummary {
    let stock = workbook.stock();
    let orders = workbook.orders();

    let mut total_pairs = 0.0;
    for row in 0..stock.len() {
        for size in SIZE_LABELS {
            total_pairs += to_number(stock.cell(row, size));
        }
    }
    let gross_sales: f64 = orders.column_values(COL_TOTAL).map(|v| to_number(Some(v))).sum();
    let outstanding_amount: f64 = outstanding_payments(&orders).iter().map(|p| p.total).sum();

    DashboardSummary {
        total_pairs,
        models: stock.len(),
        gross_sales,
        outstanding_amount,
        low_stock_alerts: low_stock(&stock, low_stock_threshold).len(),
        active_reminders: active_reminders(&workbook.reminders()).len(),
    }
}

impl<S: SheetStore> Dashboard<S> {
    pub async fn low_stock(&mut self) -> Vec<LowStockAlert> {
        let threshold = self.settings().low_stock_threshold;
        low_stock(&self.workbook().await.stock(), threshold)
    }

    pub async fn outstanding_payments(&mut self) -> Vec<OutstandingPayment> {
        outstanding_payments(&self.workbook().await.orders())
    }

    pub async fn active_reminders(&mut self) -> Vec<ActiveReminder> {
        active_reminders(&self.workbook().await.reminders())
    }

    pub async fn summary(&mut self) -> DashboardSummary {
        let threshold = self.settings().low_stock_threshold;
        summarize(&self.workbook().await, threshold)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
