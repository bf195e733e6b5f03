//! Mock keyring implementation for testing
//!
//! Provides an in-memory keyring implementation that doesn't require
//! system keyring access. Used in CI environments and for testing.

use crate::error::{ConsoleError, KeyringError};
use crate::types::{RouterPassword, KEYRING_SERVICE_PASSWORD};
use std::collections::HashMap;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref MOCK_KEYRING: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
}

/// Generate a key for the mock keyring
fn make_key(username: &str) -> String {
    format!("{}:{}", KEYRING_SERVICE_PASSWORD, username)
}

/// Store a router password in the mock keyring
pub fn store_password(username: &str, password: &RouterPassword) -> Result<(), ConsoleError> {
    let mut keyring = MOCK_KEYRING
        .lock()
        .map_err(|_| ConsoleError::Keyring(KeyringError::StoreFailed))?;
    keyring.insert(make_key(username), password.expose().to_string());
    Ok(())
}

/// Retrieve a router password from the mock keyring
pub fn retrieve_password(username: &str) -> Result<RouterPassword, ConsoleError> {
    let keyring = MOCK_KEYRING
        .lock()
        .map_err(|_| ConsoleError::Keyring(KeyringError::RetrieveFailed))?;
    keyring
        .get(&make_key(username))
        .cloned()
        .map(RouterPassword::new)
        .ok_or(ConsoleError::Keyring(KeyringError::PasswordNotFound))
}

/// Check if a password exists in the mock keyring for the given username
pub fn has_password(username: &str) -> Result<bool, ConsoleError> {
    let keyring = MOCK_KEYRING
        .lock()
        .map_err(|_| ConsoleError::Keyring(KeyringError::ServiceUnavailable))?;
    Ok(keyring.contains_key(&make_key(username)))
}

/// Delete a router password from the mock keyring
pub fn delete_password(username: &str) -> Result<(), ConsoleError> {
    let mut keyring = MOCK_KEYRING
        .lock()
        .map_err(|_| ConsoleError::Keyring(KeyringError::StoreFailed))?;
    keyring.remove(&make_key(username));
    Ok(())
}
