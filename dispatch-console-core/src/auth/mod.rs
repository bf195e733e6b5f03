//! Authentication module
//!
//! Router password storage in the system keyring.

// Use mock keyring in test mode or CI environment
#[cfg(any(test, feature = "mock-keyring"))]
#[path = "keyring_mock.rs"]
pub mod keyring;

// Use real keyring in production
#[cfg(not(any(test, feature = "mock-keyring")))]
pub mod keyring;
