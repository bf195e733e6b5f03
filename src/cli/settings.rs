//! Settings commands
//!
//! Show and edit the stored connect settings without opening a session.

use colored::Colorize;
use dispatch_console_core::{
    auth::keyring,
    config::{store::SettingsStore, store::TomlSettingsRepository, validate_address, validate_port},
    error::ConsoleError,
    types::{DEFAULT_ADDRESS, DEFAULT_PORT},
};
use std::sync::Arc;

/// Fields given to `settings set`
pub struct SettingsUpdate {
    pub address: Option<String>,
    pub port: Option<String>,
    pub username: Option<String>,
    pub autostart: Option<bool>,
}

/// Run the `settings show` command
pub fn run_show(json: bool) -> Result<(), ConsoleError> {
    let repository = TomlSettingsRepository::default_location()?;
    let path = repository.path().to_path_buf();
    let store = SettingsStore::open(Arc::new(repository))?;
    let settings = store.get();

    if json {
        let rendered = serde_json::to_string_pretty(&settings).map_err(|e| {
            ConsoleError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        println!("{}", rendered);
        return Ok(());
    }

    let address = if settings.address.is_empty() {
        format!("{} {}", DEFAULT_ADDRESS, "(default)".dimmed())
    } else {
        settings.address.clone()
    };
    let port = match settings.port {
        Some(port) => port.to_string(),
        None => format!("{} {}", DEFAULT_PORT, "(default)".dimmed()),
    };
    let password = if settings.username.is_empty() {
        "-".to_string()
    } else if keyring::has_password(&settings.username).unwrap_or(false) {
        "stored in keyring".green().to_string()
    } else {
        "not stored".yellow().to_string()
    };

    println!("{}", "Connect settings".bold());
    println!("  file:      {}", path.display());
    println!("  address:   {}", address);
    println!("  port:      {}", port);
    println!("  username:  {}", settings.username);
    println!("  password:  {}", password);
    println!("  autostart: {}", settings.autostart);
    Ok(())
}

/// Run the `settings set` command
pub fn run_set(update: SettingsUpdate) -> Result<(), ConsoleError> {
    if let Some(ref address) = update.address {
        validate_address(address)?;
    }
    let port = match update.port {
        Some(ref port) => Some(validate_port(port)?),
        None => None,
    };

    let store = SettingsStore::open(Arc::new(TomlSettingsRepository::default_location()?))?;
    let saved = store.update(|settings| {
        if let Some(address) = update.address {
            settings.address = address.trim().to_string();
        }
        if let Some(port) = port {
            settings.port = port;
        }
        if let Some(username) = update.username {
            settings.username = username;
        }
        if let Some(autostart) = update.autostart {
            settings.autostart = autostart;
        }
    })?;

    if saved {
        println!("{} Settings saved", "✓".green());
    } else {
        println!("Settings unchanged");
    }
    Ok(())
}
