//! Connection options for a router management session

use crate::types::RouterPassword;

/// Where and how to connect to a router
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Router hostname or IP address
    pub address: String,

    /// Management listener port (1..=65535)
    pub port: u16,

    pub username: String,

    pub password: Option<RouterPassword>,

    /// Ask the transport to re-dial on its own after the link drops
    pub reconnect: bool,
}

impl ConnectionOptions {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            username: String::new(),
            password: None,
            reconnect: false,
        }
    }

    /// `address:port`, as shown to the user
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Same target with transport-level reconnect switched on
    pub fn with_reconnect(mut self) -> Self {
        self.reconnect = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_format() {
        let options = ConnectionOptions::new("localhost", 5673);
        assert_eq!(options.endpoint(), "localhost:5673");
        assert!(options.with_reconnect().reconnect);
    }
}
