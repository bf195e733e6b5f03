//! Configuration module
//!
//! Connect-page settings, session tuning and form validation. Settings are
//! persisted through a [`store::SettingsRepository`]; the TOML file layout
//! lives in [`toml_config`].

use crate::error::ValidationError;
use crate::router::ConnectionOptions;
use crate::types::{RouterPassword, DEFAULT_ADDRESS, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod store;
pub mod toml_config;

/// Connect-page settings
///
/// Mirrors the connect form: everything but the password, which is kept in
/// the system keyring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Router hostname or IP address; empty means `localhost`
    pub address: String,

    /// Router management port; unset means 5673
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username for the management connection
    pub username: String,

    /// Connect as soon as the console starts
    pub autostart: bool,
}

impl Settings {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_address(&self.address)?;
        if self.port == Some(0) {
            return Err(ValidationError::PortOutOfRange {
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Session behaviour knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path prefix the console screens live under
    #[serde(default)]
    pub plugin_root: String,

    /// Upper bound for each bring-up wait (connect, schema, topology); 0 waits forever
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Upper bound for the pre-flight test connection
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Periodic topology refresh once the session is ready; 0 disables it
    #[serde(default)]
    pub topology_refresh_secs: u64,
}

fn default_stage_timeout() -> u64 {
    30
}
fn default_probe_timeout() -> u64 {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            plugin_root: String::new(),
            stage_timeout_secs: default_stage_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            topology_refresh_secs: 0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.plugin_root.is_empty() && !self.plugin_root.starts_with('/') {
            return Err("plugin_root must be empty or start with '/'".to_string());
        }
        if self.plugin_root.ends_with('/') {
            return Err("plugin_root must not end with '/'".to_string());
        }
        if self.probe_timeout_secs == 0 {
            return Err("probe_timeout_secs cannot be zero".to_string());
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn topology_refresh(&self) -> Option<Duration> {
        (self.topology_refresh_secs > 0).then(|| Duration::from_secs(self.topology_refresh_secs))
    }
}

/// Unvalidated connect form input
#[derive(Debug, Clone, Default)]
pub struct ConnectForm {
    pub address: String,
    /// Raw port text as typed; empty selects the default port
    pub port: String,
    pub username: String,
    pub password: Option<RouterPassword>,
}

impl ConnectForm {
    /// Prefill the form from stored settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            address: settings.address.clone(),
            port: settings.port.map(|p| p.to_string()).unwrap_or_default(),
            username: settings.username.clone(),
            password: None,
        }
    }

    /// Form-level validity check, run before anything touches the network
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_address(&self.address)?;
        validate_port(&self.port)?;
        Ok(())
    }

    /// Resolve into connection options, filling in the default address and port
    pub fn resolve(&self) -> Result<ConnectionOptions, ValidationError> {
        validate_address(&self.address)?;
        let port = validate_port(&self.port)?.unwrap_or(DEFAULT_PORT);
        let address = if self.address.trim().is_empty() {
            DEFAULT_ADDRESS.to_string()
        } else {
            self.address.trim().to_string()
        };

        let mut options = ConnectionOptions::new(address, port);
        options.username = self.username.clone();
        options.password = self.password.clone();
        Ok(options)
    }
}

/// Validate the port field of the connect form
///
/// The empty string is valid and means "use the default". Otherwise the text
/// is read as a number, truncated toward zero, and must land in 1..=65535.
/// Anything that does not read as a finite number counts as zero.
pub fn validate_port(value: &str) -> Result<Option<u16>, ValidationError> {
    if value.is_empty() {
        return Ok(None);
    }

    let trimmed = value.trim();
    let number = if trimmed.is_empty() {
        0.0
    } else {
        trimmed.parse::<f64>().unwrap_or(f64::NAN)
    };
    let truncated = if number.is_finite() { number.trunc() } else { 0.0 };

    if (1.0..=65535.0).contains(&truncated) {
        Ok(Some(truncated as u16))
    } else {
        Err(ValidationError::PortOutOfRange {
            value: value.to_string(),
        })
    }
}

/// Validate the address field of the connect form
///
/// Empty is allowed (the default address is substituted later). Hostnames,
/// IPv4 and bracketed or bare IPv6 literals pass.
pub fn validate_address(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']');
    if trimmed.chars().all(allowed) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress {
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_applies_defaults() {
        let form = ConnectForm::default();
        let options = form.resolve().unwrap();
        assert_eq!(options.address, "localhost");
        assert_eq!(options.port, 5673);
        assert!(!options.reconnect);
    }

    #[test]
    fn test_form_from_settings_round_trips_port() {
        let settings = Settings {
            address: "router.example.com".to_string(),
            port: Some(20001),
            username: "admin".to_string(),
            autostart: true,
        };
        let form = ConnectForm::from_settings(&settings);
        assert_eq!(form.port, "20001");
        assert_eq!(form.resolve().unwrap().endpoint(), "router.example.com:20001");
    }

    #[test]
    fn test_session_config_timeouts() {
        let mut session = SessionConfig::default();
        assert_eq!(session.stage_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(session.topology_refresh(), None);

        session.stage_timeout_secs = 0;
        assert_eq!(session.stage_timeout(), None);
    }

    #[test]
    fn test_session_config_rejects_trailing_slash_root() {
        let session = SessionConfig {
            plugin_root: "/dispatch/".to_string(),
            ..SessionConfig::default()
        };
        assert!(session.validate().is_err());
    }
}
