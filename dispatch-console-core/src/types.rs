//! Type definitions and wrappers for secure data handling
//!
//! Router passwords are wrapped with the secrecy crate so they never end up
//! in logs or debug output.

use secrecy::{ExposeSecret, Secret};

/// Address used when the connect form leaves the address empty
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Port used when the connect form leaves the port empty
pub const DEFAULT_PORT: u16 = 5673;

/// Keyring service name for router passwords
pub const KEYRING_SERVICE_PASSWORD: &str = "dispatch-console";

/// Wrapper for a router management password
#[derive(Clone, Debug)]
pub struct RouterPassword(Secret<String>);

impl RouterPassword {
    pub fn new(password: String) -> Self {
        Self(Secret::new(password))
    }

    /// Expose the password value (use with caution!)
    ///
    /// Only the transport handshake and the keyring writer need this.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl From<String> for RouterPassword {
    fn from(password: String) -> Self {
        Self::new(password)
    }
}
