//! Keyring operations for secure credential storage
//!
//! Uses the system keyring (Secret Service on Linux) to keep router
//! passwords out of the settings file. Entries live under the
//! `dispatch-console` service with the router username as account.

use crate::error::{ConsoleError, KeyringError};
use crate::types::{RouterPassword, KEYRING_SERVICE_PASSWORD};
use keyring::Entry;

fn entry(username: &str) -> Result<Entry, ConsoleError> {
    Entry::new(KEYRING_SERVICE_PASSWORD, username)
        .map_err(|_| ConsoleError::Keyring(KeyringError::ServiceUnavailable))
}

/// Store a router password in the system keyring
pub fn store_password(username: &str, password: &RouterPassword) -> Result<(), ConsoleError> {
    entry(username)?
        .set_password(password.expose())
        .map_err(|_| ConsoleError::Keyring(KeyringError::StoreFailed))
}

/// Retrieve a router password from the system keyring
///
/// Returns `KeyringError::PasswordNotFound` when nothing is stored for the user.
pub fn retrieve_password(username: &str) -> Result<RouterPassword, ConsoleError> {
    match entry(username)?.get_password() {
        Ok(password) => Ok(RouterPassword::new(password)),
        Err(keyring::Error::NoEntry) => Err(ConsoleError::Keyring(KeyringError::PasswordNotFound)),
        Err(_) => Err(ConsoleError::Keyring(KeyringError::RetrieveFailed)),
    }
}

/// Check if a password exists in the keyring for the given username
pub fn has_password(username: &str) -> Result<bool, ConsoleError> {
    match entry(username)?.get_password() {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Delete a router password from the keyring
///
/// Deleting a password that is not there succeeds.
pub fn delete_password(username: &str) -> Result<(), ConsoleError> {
    match entry(username)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(_) => Err(ConsoleError::Keyring(KeyringError::StoreFailed)),
    }
}
