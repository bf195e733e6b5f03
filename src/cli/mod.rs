//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod check;
pub mod connect;
pub mod settings;
pub mod setup;

use dispatch_console_core::config::{validate_port, ConnectForm, Settings};
use dispatch_console_core::error::ConsoleError;

/// Connect form prefilled from settings, with command-line overrides applied
pub fn form_with_overrides(
    settings: &Settings,
    address: Option<String>,
    port: Option<String>,
) -> Result<ConnectForm, ConsoleError> {
    let mut form = ConnectForm::from_settings(settings);
    if let Some(address) = address {
        form.address = address;
    }
    if let Some(port) = port {
        validate_port(&port)?;
        form.port = port;
    }
    form.validate()?;
    Ok(form)
}

/// Single-threaded runtime for one command
pub fn runtime() -> Result<tokio::runtime::Runtime, ConsoleError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
