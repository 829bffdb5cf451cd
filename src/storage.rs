//! Spreadsheet credentials in the OS credential store.
//!
//! The Sheets bearer token never lands in SQLite. `shoe-stock login` writes
//! it here, `shoe-stock logout` removes it, and start-up reads it back.

use keyring::Entry;
use tracing::{info, warn};

use crate::api::{extract_spreadsheet_from_connection_string, extract_token_from_connection_string, spreadsheet_id};

const SERVICE_NAME: &str = "shoe-stock";

pub const KEY_ACCESS_TOKEN: &str = "sheets_access_token";
pub const KEY_SPREADSHEET_LOCATION: &str = "spreadsheet_location";

const ALL_KEYS: &[&str] = &[KEY_ACCESS_TOKEN, KEY_SPREADSHEET_LOCATION];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())
}

/// Delete a credential. Succeeds if the entry does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

/// Where credentials are kept. [`Keyring`] in production.
pub trait CredentialStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn delete(&self, key: &str) -> Result<(), String>;
}

/// The OS credential store under service `shoe-stock`.
pub struct Keyring;

impl CredentialStore for Keyring {
    fn get(&self, key: &str) -> Option<String> {
        get_credential(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        set_credential(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), String> {
        delete_credential(key)
    }
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SheetCredentials {
    pub access_token: String,
    pub spreadsheet: Option<String>,
}

pub fn load_credentials(store: &impl CredentialStore) -> Option<SheetCredentials> {
    let access_token = store.get(KEY_ACCESS_TOKEN)?;
    Some(SheetCredentials {
        access_token,
        spreadsheet: store.get(KEY_SPREADSHEET_LOCATION),
    })
}

/// Turn onboarding input into credentials. `token` may be a plain bearer
/// token or a connection string carrying both token and spreadsheet; an
/// explicit `spreadsheet` wins over the one inside the connection string.
pub fn parse_credentials(token: &str, spreadsheet: Option<&str>) -> Result<SheetCredentials, String> {
    let raw = token.trim();
    let (access_token, embedded) = match extract_token_from_connection_string(raw) {
        Some(decoded) => (decoded, extract_spreadsheet_from_connection_string(raw)),
        None => (raw.to_string(), None),
    };
    if access_token.is_empty() {
        return Err("Missing required field: token".to_string());
    }

    let spreadsheet = spreadsheet
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or(embedded);
    if let Some(location) = spreadsheet.as_deref() {
        if spreadsheet_id(location).is_none() {
            return Err(format!("Not a spreadsheet URL or id: {location}"));
        }
    }

    Ok(SheetCredentials {
        access_token,
        spreadsheet,
    })
}

/// Validate and store login input. A login without a spreadsheet keeps the
/// previously stored one.
pub fn update_credentials(
    store: &impl CredentialStore,
    token: &str,
    spreadsheet: Option<&str>,
) -> Result<SheetCredentials, String> {
    let mut credentials = parse_credentials(token, spreadsheet)?;
    store.set(KEY_ACCESS_TOKEN, &credentials.access_token)?;
    match credentials.spreadsheet.as_deref() {
        Some(location) => store.set(KEY_SPREADSHEET_LOCATION, location)?,
        None => credentials.spreadsheet = store.get(KEY_SPREADSHEET_LOCATION),
    }
    info!(has_spreadsheet = credentials.spreadsheet.is_some(), "sheet credentials updated");
    Ok(credentials)
}

/// Delete every stored credential.
pub fn factory_reset(store: &impl CredentialStore) -> Result<(), String> {
    info!("deleting all sheet credentials");
    for key in ALL_KEYS {
        store.delete(key)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SHEET_ID: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz0123456789";

    #[derive(Default)]
    struct MemoryCredentials(Mutex<HashMap<String, String>>);

    impl CredentialStore for MemoryCredentials {
        fn get(&self, key: &str) -> Option<String> {
            self.0.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> Result<(), String> {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<(), String> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[test]
    fn test_update_then_load_then_reset() {
        let store = MemoryCredentials::default();
        assert_eq!(load_credentials(&store), None);

        update_credentials(&store, "ya29.first", Some(SHEET_ID)).unwrap();
        let creds = update_credentials(&store, " ya29.second ", None).unwrap();
        assert_eq!(creds.spreadsheet.as_deref(), Some(SHEET_ID));

        let loaded = load_credentials(&store).unwrap();
        assert_eq!(loaded.access_token, "ya29.second");
        assert_eq!(loaded.spreadsheet.as_deref(), Some(SHEET_ID));

        factory_reset(&store).unwrap();
        assert_eq!(load_credentials(&store), None);
        assert_eq!(store.get(KEY_SPREADSHEET_LOCATION), None);
    }

    #[test]
    fn test_rejected_login_stores_nothing() {
        let store = MemoryCredentials::default();
        assert!(update_credentials(&store, "tok", Some("not a sheet!")).is_err());
        assert_eq!(load_credentials(&store), None);
    }

    #[test]
    fn test_parse_plain_token() {
        let creds = parse_credentials("  ya29.token  ", Some(SHEET_ID)).unwrap();
        assert_eq!(creds.access_token, "ya29.token");
        assert_eq!(creds.spreadsheet.as_deref(), Some(SHEET_ID));
    }

    #[test]
    fn test_parse_connection_string() {
        let payload = format!(r#"{{"token":"ya29.abc","sheet":"{SHEET_ID}"}}"#);
        let encoded = STANDARD.encode(payload);

        let creds = parse_credentials(&encoded, None).unwrap();
        assert_eq!(creds.access_token, "ya29.abc");
        assert_eq!(creds.spreadsheet.as_deref(), Some(SHEET_ID));

        let creds = parse_credentials(&encoded, Some("otherSheetId")).unwrap();
        assert_eq!(creds.spreadsheet.as_deref(), Some("otherSheetId"));
    }

    #[test]
    fn test_parse_rejects_blank_token_and_bad_location() {
        assert!(parse_credentials("   ", None).is_err());
        assert!(parse_credentials("tok", Some("not a sheet!")).is_err());
    }
}
