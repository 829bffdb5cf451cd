//! Sales: the cart and checkout.
//!
//! A cart is a plain list of line items that lives only in the session. On
//! checkout the Stock sheet is decremented and saved, then an order row is
//! appended to Orders and saved. The two writes are independent: if the
//! second fails the stock change stays, and nothing rolls it back.
//!
//! Checkout is not idempotent. Running it twice with the same cart sells the
//! goods twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::core_helpers::{display_timestamp, normalize_status};
use crate::dashboard::Dashboard;
use crate::loader::Workbook;
use crate::numeric::{format_amount, to_quantity};
use crate::sheet::{
    text_cell, Sheet, Worksheet, COL_CUSTOMER, COL_DATE, COL_MODEL, COL_PAYMENT_STATUS,
    COL_SUMMARY, COL_TOTAL, SIZE_LABELS,
};
use crate::store::SheetStore;

pub const SUMMARY_SEPARATOR: &str = ", ";

// ---------------------------------------------------------------------------
// Payment status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Pending,
    /// Half paid up front, the rest still owed.
    Half,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [
        PaymentStatus::Paid,
        PaymentStatus::Pending,
        PaymentStatus::Half,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Half => "Half",
        }
    }

    /// Case-insensitive parse of a stored status.
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_status(raw).as_str() {
            "paid" => Some(PaymentStatus::Paid),
            "pending" => Some(PaymentStatus::Pending),
            "half" => Some(PaymentStatus::Half),
            _ => None,
        }
    }

    /// Money is still owed on the order.
    pub fn is_outstanding(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Half)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub model: String,
    pub size: String,
    pub quantity: i64,
    pub unit_price: f64,
}

impl CartItem {
    pub fn new(model: impl Into<String>, size: impl Into<String>, quantity: i64, unit_price: f64) -> Self {
        Self {
            model: model.into(),
            size: size.into(),
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }

    /// `model(sizexqty)`, e.g. `Chinelo X(37-38x2)`.
    pub fn summary_fragment(&self) -> String {
        format!("{}({}x{})", self.model, self.size, self.quantity)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: CartItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn summary(&self) -> String {
        self.items
            .iter()
            .map(CartItem::summary_fragment)
            .collect::<Vec<_>>()
            .join(SUMMARY_SEPARATOR)
    }
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("model not found in stock: {0}")]
    UnknownModel(String),
    #[error("unknown size: {0}")]
    UnknownSize(String),
    #[error("{worksheet} could not be loaded ({reason}); refusing to overwrite it")]
    SheetUnavailable { worksheet: Worksheet, reason: String },
    #[error("{0}")]
    StockWrite(String),
    #[error("stock was updated but the order was not logged: {0}")]
    OrderWrite(String),
}

/// Outcome of a successful checkout, as logged in the Orders sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub date: String,
    pub customer: String,
    pub summary: String,
    pub total: f64,
    pub payment_status: PaymentStatus,
}

impl CheckoutReceipt {
    pub fn order_record(&self) -> Vec<(&'static str, Value)> {
        vec![
            (COL_DATE, text_cell(&self.date)),
            (COL_CUSTOMER, text_cell(&self.customer)),
            (COL_SUMMARY, text_cell(&self.summary)),
            (COL_TOTAL, text_cell(format_amount(self.total))),
            (COL_PAYMENT_STATUS, text_cell(self.payment_status.as_str())),
        ]
    }
}

/// Decrement `stock` for every line item, in cart order.
///
/// Each item hits the first row whose model matches exactly. Quantities are
/// not floored, so overselling leaves a negative count.
pub fn apply_sale(stock: &mut Sheet, items: &[CartItem]) -> Result<(), CheckoutError> {
    for item in items {
        if !SIZE_LABELS.contains(&item.size.as_str()) || !stock.has_column(&item.size) {
            return Err(CheckoutError::UnknownSize(item.size.clone()));
        }
        let row = stock
            .find_row(COL_MODEL, &item.model)
            .ok_or_else(|| CheckoutError::UnknownModel(item.model.clone()))?;
        let remaining = to_quantity(stock.cell(row, &item.size)).saturating_sub(item.quantity);
        stock.set_cell(row, &item.size, text_cell(remaining.to_string()));
    }
    Ok(())
}

fn require_fetched(workbook: &Workbook, worksheet: Worksheet) -> Result<Sheet, CheckoutError> {
    workbook
        .fetched_sheet(worksheet)
        .map_err(|reason| CheckoutError::SheetUnavailable { worksheet, reason })
}

impl<S: SheetStore> Dashboard<S> {
    pub async fn checkout(
        &mut self,
        cart: &mut Cart,
        customer: &str,
        payment_status: PaymentStatus,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        self.checkout_at(cart, customer, payment_status, Utc::now()).await
    }

    /// Checkout with an explicit timestamp for the order row.
    ///
    /// The cart is cleared only when both writes succeed.
    pub async fn checkout_at(
        &mut self,
        cart: &mut Cart,
        customer: &str,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let workbook = self.workbook().await;
        let mut stock = require_fetched(&workbook, Worksheet::Stock)?;
        let mut orders = require_fetched(&workbook, Worksheet::Orders)?;

        apply_sale(&mut stock, cart.items())?;
        self.save(Worksheet::Stock, &stock)
            .await
            .map_err(CheckoutError::StockWrite)?;

        let receipt = CheckoutReceipt {
            date: display_timestamp(at),
            customer: customer.trim().to_string(),
            summary: cart.summary(),
            total: cart.total(),
            payment_status,
        };
        orders.push_record(&receipt.order_record());
        if let Err(e) = self.save(Worksheet::Orders, &orders).await {
            error!(summary = %receipt.summary, error = %e, "stock saved but order not logged");
            return Err(CheckoutError::OrderWrite(e));
        }

        cart.clear();
        info!(
            customer = %receipt.customer,
            summary = %receipt.summary,
            total = receipt.total,
            status = %receipt.payment_status,
            "sale registered"
        );
        Ok(receipt)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
