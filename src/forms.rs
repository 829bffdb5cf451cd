//! Form-driven mutations: model registration, customer registration,
//! reminder scheduling and order deletion.
//!
//! Each one loads the workbook, edits one sheet in memory and writes that
//! sheet back in full.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core_helpers::{display_timestamp, non_blank};
use crate::dashboard::Dashboard;
use crate::numeric::format_amount;
use crate::sheet::{
    cell_text, text_cell, Sheet, Worksheet, COL_CITY, COL_CUSTOMER, COL_DATE, COL_DUE_DATE,
    COL_MODEL, COL_NAME, COL_PHONE, COL_STORE, COL_SUMMARY, COL_VALUE, SIZE_LABELS,
};
use crate::store::SheetStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub store: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub phone: String,
}

/// Stock quantities keyed by size label, for a new model.
pub type SizeQuantities<'a> = &'a [(&'a str, i64)];

impl<S: SheetStore> Dashboard<S> {
    async fn editable_sheet(&mut self, worksheet: Worksheet) -> Result<Sheet, String> {
        self.workbook()
            .await
            .fetched_sheet(worksheet)
            .map_err(|reason| format!("{worksheet} could not be loaded ({reason}); not saving"))
    }

    /// Add a model to Stock. Sizes not listed start at zero.
    pub async fn register_model(&mut self, model: &str, quantities: SizeQuantities<'_>) -> Result<(), String> {
        let model = non_blank(model).ok_or("Model name is required")?;
        if let Some((size, _)) = quantities.iter().find(|(s, _)| !SIZE_LABELS.contains(s)) {
            return Err(format!("Unknown size: {size}"));
        }

        let mut stock = self.editable_sheet(Worksheet::Stock).await?;
        if stock.find_row(COL_MODEL, model).is_some() {
            return Err(format!("Model already registered: {model}"));
        }

        let mut record = vec![(COL_MODEL, text_cell(model))];
        for size in SIZE_LABELS {
            let qty = quantities
                .iter()
                .find(|(s, _)| *s == size)
                .map(|(_, q)| *q)
                .unwrap_or(0);
            record.push((size, text_cell(qty.to_string())));
        }
        stock.push_record(&record);

        self.save(Worksheet::Stock, &stock).await?;
        info!(model, "model registered");
        Ok(())
    }

    pub async fn register_customer(&mut self, customer: &NewCustomer) -> Result<(), String> {
        let name = non_blank(&customer.name).ok_or("Customer name is required")?;

        let mut customers = self.editable_sheet(Worksheet::Customers).await?;
        customers.push_record(&[
            (COL_NAME, text_cell(name)),
            (COL_STORE, text_cell(customer.store.trim())),
            (COL_CITY, text_cell(customer.city.trim())),
            (COL_PHONE, text_cell(customer.phone.trim())),
        ]);

        self.save(Worksheet::Customers, &customers).await?;
        info!(name, "customer registered");
        Ok(())
    }

    pub async fn schedule_reminder(&mut self, title: &str, due_date: &str, value: f64) -> Result<(), String> {
        self.schedule_reminder_at(title, due_date, value, Utc::now()).await
    }

    /// Append a reminder stamped with `at` as its creation time.
    pub async fn schedule_reminder_at(
        &mut self,
        title: &str,
        due_date: &str,
        value: f64,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        let title = non_blank(title).ok_or("Reminder title is required")?;

        let mut reminders = self.editable_sheet(Worksheet::Reminders).await?;
        reminders.push_record(&[
            (COL_DATE, text_cell(display_timestamp(at))),
            (COL_NAME, text_cell(title)),
            (COL_DUE_DATE, text_cell(due_date.trim())),
            (COL_VALUE, text_cell(format_amount(value))),
        ]);

        self.save(Worksheet::Reminders, &reminders).await?;
        info!(title, due_date, "reminder scheduled");
        Ok(())
    }

    /// Remove the order at `position` (row index in the Orders sheet as
    /// loaded). The other rows keep their relative order.
    pub async fn delete_order(&mut self, position: usize) -> Result<(), String> {
        let mut orders = self.editable_sheet(Worksheet::Orders).await?;
        let removed = orders
            .remove_row(position)
            .ok_or_else(|| format!("No order at position {position}"))?;

        self.save(Worksheet::Orders, &orders).await?;
        let column = |name: &str| {
            orders
                .column_index(name)
                .and_then(|i| removed.get(i))
                .map(cell_text)
                .unwrap_or_default()
        };
        info!(
            position,
            customer = %column(COL_CUSTOMER),
            summary = %column(COL_SUMMARY),
            "order deleted"
        );
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::to_number;
    use crate::test_support::{dashboard_with, seed, text_row, FlakyStore};
    use chrono::TimeZone;

    const LOC: &str = "book";

    fn orders_sheet(customers: &[&str]) -> Sheet {
        let mut sheet = Worksheet::Orders.empty_sheet();
        for c in customers {
            sheet.push_record(&[(COL_CUSTOMER, text_cell(*c))]);
        }
        sheet
    }

    #[tokio::test]
    async fn test_register_model_fills_all_sizes() {
        let store = FlakyStore::seeded_empty(LOC).await;
        let mut dash = dashboard_with(store, LOC);

        dash.register_model(" Tenis Run ", &[("37-38", 6), ("39-40", 2)])
            .await
            .unwrap();

        let stock = dash.sync().await.stock();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock.text(0, COL_MODEL), "Tenis Run");
        assert_eq!(stock.text(0, "37-38"), "6");
        assert_eq!(stock.text(0, "39-40"), "2");
        assert_eq!(stock.text(0, "25-26"), "0");
    }

    #[tokio::test]
    async fn test_register_model_rejects_duplicates_and_bad_input() {
        let store = FlakyStore::seeded_empty(LOC).await;
        let mut dash = dashboard_with(store, LOC);
        dash.register_model("Bota", &[]).await.unwrap();

        assert!(dash.register_model("Bota", &[]).await.is_err());
        assert!(dash.register_model("  ", &[]).await.is_err());
        assert!(dash.register_model("Sapato", &[("50-51", 1)]).await.is_err());
        assert_eq!(dash.store().writes(), 1);
    }

    #[tokio::test]
    async fn test_customers_reload_sorted_by_name() {
        let store = FlakyStore::seeded_empty(LOC).await;
        let mut dash = dashboard_with(store, LOC);
        for name in ["zeca", "Ana", "bia"] {
            dash.register_customer(&NewCustomer {
                name: name.into(),
                city: "Recife".into(),
                ..NewCustomer::default()
            })
            .await
            .unwrap();
        }

        let customers = dash.sync().await.customers();
        let names: Vec<String> = (0..customers.len()).map(|r| customers.text(r, COL_NAME)).collect();
        assert_eq!(names, vec!["Ana", "bia", "zeca"]);
        assert_eq!(customers.text(0, COL_CITY), "Recife");
    }

    #[tokio::test]
    async fn test_register_customer_requires_name() {
        let store = FlakyStore::seeded_empty(LOC).await;
        let mut dash = dashboard_with(store, LOC);
        let err = dash.register_customer(&NewCustomer::default()).await.unwrap_err();
        assert!(err.contains("name"));
    }

    #[tokio::test]
    async fn test_schedule_reminder_appends_row() {
        let store = FlakyStore::seeded_empty(LOC).await;
        let mut dash = dashboard_with(store, LOC);
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();

        dash.schedule_reminder_at("Boleto fornecedor", "20/01", 350.5, at)
            .await
            .unwrap();

        let reminders = dash.sync().await.reminders();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders.text(0, COL_DATE), "15/01/2024 09:00");
        assert_eq!(reminders.text(0, COL_DUE_DATE), "20/01");
        assert_eq!(to_number(reminders.cell(0, COL_VALUE)), 350.5);
    }

    #[tokio::test]
    async fn test_delete_order_preserves_relative_order() {
        let store = FlakyStore::seeded_empty(LOC).await;
        seed(&store, LOC, Worksheet::Orders, &orders_sheet(&["a", "b", "c", "d"])).await;
        let mut dash = dashboard_with(store, LOC);

        dash.delete_order(1).await.unwrap();

        let orders = dash.sync().await.orders();
        let customers: Vec<String> = (0..orders.len()).map(|r| orders.text(r, COL_CUSTOMER)).collect();
        assert_eq!(customers, vec!["a", "c", "d"]);
    }

    #[tokio::test]
    async fn test_delete_order_out_of_range() {
        let store = FlakyStore::seeded_empty(LOC).await;
        seed(&store, LOC, Worksheet::Orders, &orders_sheet(&["a"])).await;
        let mut dash = dashboard_with(store, LOC);

        assert!(dash.delete_order(3).await.is_err());
        assert_eq!(dash.store().writes(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_sheet_is_never_overwritten() {
        let store = FlakyStore::seeded_empty(LOC).await;
        seed(
            &store,
            LOC,
            Worksheet::Customers,
            &Sheet::from_rows(vec![COL_NAME.into()], vec![text_row(&["Ana"])]),
        )
        .await;
        store.fail_reads_of("Customers");
        let mut dash = dashboard_with(store, LOC);

        let err = dash
            .register_customer(&NewCustomer {
                name: "Bia".into(),
                ..NewCustomer::default()
            })
            .await
            .unwrap_err();
        assert!(err.contains("could not be loaded"));
        assert_eq!(dash.store().writes(), 0);
    }
}
