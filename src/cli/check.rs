//! Check command implementation
//!
//! Test-connects to the router the way the connect form does before a real
//! connect, and reports the result.

use super::{form_with_overrides, runtime};
use colored::Colorize;
use dispatch_console_core::{
    config::toml_config::load_config,
    error::{ConnectionError, ConsoleError},
    router::{BridgeTransport, ConnectionHandle},
};
use std::sync::Arc;
use tracing::debug;

/// Run the check command
pub fn run_check(address: Option<String>, port: Option<String>) -> Result<(), ConsoleError> {
    let config = load_config()?;
    let session = config.session_config();
    let options = form_with_overrides(&config.settings, address, port)?.resolve()?;

    let transport = Arc::new(BridgeTransport::new(session.probe_timeout()));
    let connection = ConnectionHandle::new(transport, config.reconnection_policy());

    let endpoint = options.endpoint();
    println!("Checking {} ...", endpoint);
    let result = runtime()?.block_on(connection.test_connect(&options));

    match result.error {
        None => {
            println!("{} Router reachable at {}", "✓".green(), endpoint);
            Ok(())
        }
        Some(reason) => {
            debug!(%reason, "Test connect failed");
            let failure = ConnectionError::TestConnectFailed { endpoint };
            println!("{} {} ({})", "✗".red(), failure, reason);
            Err(failure.into())
        }
    }
}
