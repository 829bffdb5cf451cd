//! Cell value normalization.
//!
//! Spreadsheet cells come back as anything: JSON numbers, blanks, `"nan"`, or
//! display strings like `R$ 1.234,56` (Brazilian locale: dot thousands
//! separator, decimal comma). Everything funnels through [`to_number`], which
//! never fails: unreadable values count as zero.

use serde_json::Value;

/// Currency prefix used by the shop's spreadsheet locale.
pub const CURRENCY_MARKER: &str = "R$";

/// Normalize an optional cell into a float. Missing, blank, `nan` and
/// unparseable values all yield `0.0`.
pub fn to_number(cell: Option<&Value>) -> f64 {
    match cell {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => parse_number_text(s),
        Some(other) => parse_number_text(&other.to_string()),
    }
}

/// Parse a locale-formatted amount such as `R$ 1.234,56`.
pub fn parse_number_text(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return 0.0;
    }
    let cleaned = trimmed
        .replace(CURRENCY_MARKER, "")
        .replace('.', "")
        .replace(',', ".");
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Stock quantity of a cell, truncated toward zero.
pub fn to_quantity(cell: Option<&Value>) -> i64 {
    to_number(cell).trunc() as i64
}

/// Render an amount the way the core writes it back: two decimals, decimal
/// comma, no thousands separator (`1234,50`).
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}").replace('.', ",")
}

// ===========================================================================
// Tests
// ===========================================================================
