//! TOML configuration file I/O
//!
//! Handles loading and saving console configuration to/from TOML files
//! in the user's configuration directory.

use crate::config::{SessionConfig, Settings};
use crate::error::{ConfigError, ConsoleError};
use crate::router::reconnection::ReconnectionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Complete TOML configuration structure
///
/// Connect-page settings plus the optional reconnection and session tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Connect-page settings
    #[serde(default)]
    pub settings: Settings,

    /// Reconnection policy settings (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnection: Option<ReconnectionPolicy>,

    /// Session tuning (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConsoleError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(ConfigError::IoError {
                message: format!("Failed to read config file: {}", e),
            })
        })?;

        let config: TomlConfig = toml::from_str(&contents).map_err(|e| {
            ConsoleError::Config(ConfigError::ValidationError {
                message: format!("Failed to parse config file: {}", e),
            })
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, or the defaults if the file does not exist yet
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConsoleError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("No configuration at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConsoleError> {
        self.validate()?;

        let contents = toml::to_string_pretty(self)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConsoleError::Config(ConfigError::IoError {
                    message: format!("Failed to create config directory: {}", e),
                })
            })?;
        }

        std::fs::write(path, contents).map_err(|_e| {
            ConsoleError::Config(ConfigError::SaveFailed {
                path: path.to_string_lossy().to_string(),
            })
        })?;

        Ok(())
    }

    /// Validate every table that is present
    pub fn validate(&self) -> Result<(), ConsoleError> {
        self.settings.validate().map_err(|e| {
            ConsoleError::Config(ConfigError::ValidationError {
                message: format!("Invalid settings: {}", e),
            })
        })?;

        if let Some(ref policy) = self.reconnection {
            debug!("Validating reconnection policy from config");
            policy.validate().map_err(|e| {
                warn!("Reconnection policy validation failed: {}", e);
                ConsoleError::Config(ConfigError::ValidationError {
                    message: format!("Invalid reconnection policy: {}", e),
                })
            })?;
        }

        if let Some(ref session) = self.session {
            session.validate().map_err(|message| {
                ConsoleError::Config(ConfigError::ValidationError {
                    message: format!("Invalid session settings: {}", message),
                })
            })?;
        }

        Ok(())
    }

    /// Get the reconnection policy, or the default one
    pub fn reconnection_policy(&self) -> ReconnectionPolicy {
        self.reconnection.clone().unwrap_or_default()
    }

    /// Get the session settings, or the default ones
    pub fn session_config(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }
}

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns ~/.config/dispatch-console, or DISPATCH_CONSOLE_CONFIG_DIR if set
pub fn get_config_dir() -> Result<PathBuf, ConsoleError> {
    // Allow tests to override config directory via environment variable
    if let Ok(config_dir) = std::env::var("DISPATCH_CONSOLE_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        ConsoleError::Config(ConfigError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;

    Ok(PathBuf::from(home).join(".config").join("dispatch-console"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, ConsoleError> {
    let config_dir = get_config_dir()?;
    Ok(config_dir.join(CONFIG_FILE_NAME))
}

/// Load the complete configuration from the default TOML file
pub fn load_config() -> Result<TomlConfig, ConsoleError> {
    let config_path = get_config_path()?;
    TomlConfig::from_file_or_default(&config_path)
}

/// Load connect-page settings from a specific TOML file
///
/// A missing file yields default settings, like a first visit to the connect page.
pub fn load_settings_from_path<P: AsRef<Path>>(path: P) -> Result<Settings, ConsoleError> {
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(e) => {
            return Err(ConsoleError::Config(ConfigError::LoadFailed {
                path: format!("{} ({})", path.as_ref().to_string_lossy(), e),
            }))
        }
    };

    let config: TomlConfig = toml::from_str(&contents).map_err(|e| {
        ConsoleError::Config(ConfigError::IoError {
            message: format!("Failed to parse TOML: {}", e),
        })
    })?;

    config
        .settings
        .validate()
        .map_err(|e| ConsoleError::Config(ConfigError::ValidationError { message: e.to_string() }))?;

    Ok(config.settings)
}

/// Save connect-page settings to a specific TOML file
///
/// Other tables already in the file are preserved.
pub fn save_settings_to_path<P: AsRef<Path>>(settings: &Settings, path: P) -> Result<(), ConsoleError> {
    let mut config = TomlConfig::from_file_or_default(path.as_ref())?;
    config.settings = settings.clone();
    config.to_file(path.as_ref())?;

    info!("Saved console settings to {:?}", path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_settings_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let original = Settings {
            address: "router.example.com".to_string(),
            port: Some(5673),
            username: "admin".to_string(),
            autostart: true,
        };

        save_settings_to_path(&original, &config_path).unwrap();
        let loaded = load_settings_from_path(&config_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempdir().unwrap();
        let loaded = load_settings_from_path(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_save_preserves_session_table() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = TomlConfig {
            session: Some(SessionConfig {
                plugin_root: "/dispatch".to_string(),
                ..SessionConfig::default()
            }),
            ..TomlConfig::default()
        };
        config.to_file(&config_path).unwrap();

        let settings = Settings {
            address: "10.0.0.7".to_string(),
            ..Settings::default()
        };
        save_settings_to_path(&settings, &config_path).unwrap();

        let reloaded = TomlConfig::from_file(&config_path).unwrap();
        assert_eq!(reloaded.settings.address, "10.0.0.7");
        assert_eq!(reloaded.session_config().plugin_root, "/dispatch");
    }
}
