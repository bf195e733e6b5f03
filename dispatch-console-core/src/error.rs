//! Error types for the dispatch console
//!
//! This module defines all error types used throughout the console,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the console
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to keyring operations
    #[error("Keyring error: {0}")]
    Keyring(#[from] KeyringError),

    /// Connect form input rejected before any network call
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Errors related to the router connection and management requests
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// System keyring operation errors
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Keyring service unavailable")]
    ServiceUnavailable,

    #[error("Failed to store credential in keyring")]
    StoreFailed,

    #[error("Failed to retrieve credential from keyring")]
    RetrieveFailed,

    #[error("Password not found in keyring")]
    PasswordNotFound,
}

/// Connect form validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Port must be a number between 1 and 65535, got: {value:?}")]
    PortOutOfRange { value: String },

    #[error("Address contains invalid characters: {value:?}")]
    InvalidAddress { value: String },
}

/// Router connection and management errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The pre-flight test connection was refused or unreachable
    #[error("Unable to connect to {endpoint}")]
    TestConnectFailed { endpoint: String },

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Not connected to a router")]
    NotConnected,

    #[error("Connection to router lost")]
    LinkClosed,

    #[error("Management request failed with status {status}: {description}")]
    Management { status: u16, description: String },

    #[error("Malformed management response: {reason}")]
    Protocol { reason: String },

    #[error("Timed out after {seconds} seconds waiting for {stage}")]
    StageTimeout { stage: String, seconds: u64 },

    #[error("A connection attempt is already in progress")]
    BringUpInProgress,

    /// A pending completion signal was dropped before it fired
    #[error("Connection attempt abandoned")]
    Abandoned,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ConsoleError>;
