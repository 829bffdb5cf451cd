//! Google Sheets API client.
//!
//! Implements [`SheetStore`] over the Sheets v4 `values` endpoints. A
//! worksheet read is a single GET of the tab's values; a write clears the tab
//! and PUTs the header row plus every data row, so the remote tab ends up as
//! an exact copy of the in-memory sheet.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::sheet::{cell_text, Sheet};
use crate::store::{unnamed_header, SheetStore};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";

const SPREADSHEET_PATH_MARKER: &str = "/spreadsheets/d/";

// ---------------------------------------------------------------------------
// URL / location normalisation
// ---------------------------------------------------------------------------

/// Normalise the API base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_api_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Extract the spreadsheet id from a share URL
/// (`https://docs.google.com/spreadsheets/d/{id}/edit#gid=0`) or accept a
/// bare id.
pub fn spreadsheet_id(location: &str) -> Option<String> {
    let trimmed = location.trim();
    let candidate = match trimmed.find(SPREADSHEET_PATH_MARKER) {
        Some(pos) => trimmed[pos + SPREADSHEET_PATH_MARKER.len()..]
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(""),
        None => trimmed,
    };
    let valid = !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Some(candidate.to_string())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Connection strings
// ---------------------------------------------------------------------------

/// Decode a connection string: either raw JSON or base64(url-safe or
/// standard) JSON of the shape `{"sheet": "...", "token": "..."}`.
fn decode_connection_string_payload(raw: &str) -> Option<Value> {
    let compact: String = raw.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('{') {
        return serde_json::from_str::<Value>(&compact).ok();
    }
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

fn connection_string_field(raw: &str, keys: &[&str]) -> Option<String> {
    let payload = decode_connection_string_payload(raw)?;
    keys.iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn extract_token_from_connection_string(raw: &str) -> Option<String> {
    connection_string_field(raw, &["token", "accessToken"])
}

pub fn extract_spreadsheet_from_connection_string(raw: &str) -> Option<String> {
    connection_string_field(raw, &["sheet", "spreadsheet", "url"])
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach spreadsheet service at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid spreadsheet service URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "Spreadsheet rejected the request".to_string(),
        401 => "Access token is invalid or expired".to_string(),
        403 => "No permission to access this spreadsheet".to_string(),
        404 => "Spreadsheet or worksheet not found".to_string(),
        429 => "Spreadsheet API quota exceeded, try again shortly".to_string(),
        s if s >= 500 => format!("Spreadsheet service error (HTTP {s})"),
        s => format!("Unexpected response from spreadsheet service (HTTP {s})"),
    }
}

/// Build an error message from a non-success response, keeping the API's own
/// error text when present.
async fn response_error(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body_text = resp.text().await.unwrap_or_default();
    let api_message = serde_json::from_str::<Value>(&body_text).ok().and_then(|json| {
        json.pointer("/error/message")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
    });
    match api_message {
        Some(message) => format!("{} (HTTP {}): {message}", status_error(status), status.as_u16()),
        None => format!("{} (HTTP {})", status_error(status), status.as_u16()),
    }
}

// ---------------------------------------------------------------------------
// Grid conversion
// ---------------------------------------------------------------------------

/// Turn a `values` grid (first row = headers) into a sheet. Blank header
/// cells become `Unnamed: {index}`; the width is the widest row.
pub fn values_to_sheet(values: Vec<Vec<Value>>) -> Sheet {
    let mut rows = values.into_iter();
    let Some(header) = rows.next() else {
        return Sheet::default();
    };
    let body: Vec<Vec<Value>> = rows.collect();
    let width = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let columns = (0..width)
        .map(|i| {
            let name = header.get(i).map(cell_text).unwrap_or_default();
            if name.trim().is_empty() {
                unnamed_header(i)
            } else {
                name
            }
        })
        .collect();
    Sheet::from_rows(columns, body)
}

/// Header row followed by every data row, all as text.
pub fn sheet_to_values(sheet: &Sheet) -> Vec<Vec<Value>> {
    let mut values = Vec::with_capacity(sheet.len() + 1);
    values.push(
        sheet
            .columns()
            .iter()
            .map(|c| Value::String(c.clone()))
            .collect(),
    );
    for row in sheet.rows() {
        values.push(row.iter().map(|c| Value::String(cell_text(c))).collect());
    }
    values
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct GoogleSheetsStore {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GoogleSheetsStore {
    pub fn new(base_url: &str, access_token: &str) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;
        let access_token = extract_token_from_connection_string(access_token)
            .unwrap_or_else(|| access_token.trim().to_string());
        Ok(Self {
            client,
            base_url: normalize_api_url(base_url),
            access_token,
        })
    }

    fn values_url(&self, location: &str, range: &str) -> Result<Url, String> {
        let id = spreadsheet_id(location)
            .ok_or_else(|| format!("Invalid spreadsheet location: {location}"))?;
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid spreadsheet service URL {}: {e}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| format!("Invalid spreadsheet service URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", id.as_str(), "values", range]);
        Ok(url)
    }

    async fn clear(&self, location: &str, worksheet: &str) -> Result<(), String> {
        let url = self.values_url(location, &format!("{worksheet}:clear"))?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        if !resp.status().is_success() {
            return Err(response_error(resp).await);
        }
        Ok(())
    }
}

impl SheetStore for GoogleSheetsStore {
    async fn read(&self, location: &str, worksheet: &str) -> Result<Sheet, String> {
        let url = self.values_url(location, worksheet)?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        if !resp.status().is_success() {
            return Err(response_error(resp).await);
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("Invalid JSON from spreadsheet service: {e}"))?;
        // An empty tab has no "values" key at all.
        let values: Vec<Vec<Value>> = match body.get("values") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| format!("Unexpected values grid for {worksheet}: {e}"))?,
            None => Vec::new(),
        };
        debug!(worksheet, rows = values.len(), "worksheet fetched");
        Ok(values_to_sheet(values))
    }

    async fn write(&self, location: &str, worksheet: &str, sheet: &Sheet) -> Result<(), String> {
        self.clear(location, worksheet).await?;

        let mut url = self.values_url(location, worksheet)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = serde_json::json!({
            "range": worksheet,
            "majorDimension": "ROWS",
            "values": sheet_to_values(sheet),
        });
        let resp = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        if !resp.status().is_success() {
            return Err(response_error(resp).await);
        }
        info!(worksheet, rows = sheet.len(), "worksheet pushed to spreadsheet");
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
