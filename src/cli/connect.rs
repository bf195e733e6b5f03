//! Connect command implementation
//!
//! Runs the full bring-up against the router and then follows the session:
//! phase and location changes are printed until Ctrl-C, which disconnects.

use super::{form_with_overrides, runtime};
use chrono::Local;
use colored::Colorize;
use dispatch_console_core::{
    auth::keyring,
    config::{
        store::{SettingsStore, TomlSettingsRepository},
        toml_config::{get_config_path, load_config},
        ConnectForm,
    },
    error::{ConsoleError, KeyringError},
    router::{BridgeTransport, Management},
    session::{BringUpPhase, ConnectOrchestrator, Location, Navigator, SubmitOutcome},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Overrides given on the command line
#[derive(Debug, Default)]
pub struct ConnectArgs {
    pub address: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
}

/// Run the connect command
pub fn run_connect(args: ConnectArgs) -> Result<(), ConsoleError> {
    let config = load_config()?;
    let session = config.session_config();

    let settings = Arc::new(SettingsStore::open(Arc::new(TomlSettingsRepository::new(
        get_config_path()?,
    )))?);
    let mut form = form_with_overrides(&settings.get(), args.address, args.port)?;
    form.password = load_password(&form)?;

    let transport = Arc::new(BridgeTransport::new(session.probe_timeout()));
    let management = Management::new(transport, config.reconnection_policy());

    let start = match args.path {
        Some(path) => Location::parse(&path),
        None => Location::new(format!("{}/connect", session.plugin_root)),
    };
    let navigator = Navigator::new(session.plugin_root.clone(), start);

    runtime()?.block_on(async {
        let orchestrator = ConnectOrchestrator::new(management, settings, navigator, &session);
        run_session(&orchestrator, &form).await
    })
}

/// Password for the form's user, if one is stored
fn load_password(
    form: &ConnectForm,
) -> Result<Option<dispatch_console_core::types::RouterPassword>, ConsoleError> {
    if form.username.is_empty() {
        return Ok(None);
    }
    match keyring::retrieve_password(&form.username) {
        Ok(password) => Ok(Some(password)),
        Err(ConsoleError::Keyring(KeyringError::PasswordNotFound)) => {
            debug!(username = %form.username, "No stored password, connecting without one");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn run_session(orchestrator: &ConnectOrchestrator, form: &ConnectForm) -> Result<(), ConsoleError> {
    let mut phases = orchestrator.subscribe_phase();
    let mut locations = orchestrator.navigator().subscribe();

    println!("{} {}", stamp(), orchestrator.navigator().current());
    let outcome = tokio::select! {
        outcome = orchestrator.submit(form) => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!("{} Interrupted", stamp());
            orchestrator.shutdown().await;
            return Ok(());
        }
    };

    match outcome {
        Ok(SubmitOutcome::Ready(location)) => {
            println!("{} {} {}", stamp(), "Ready".green().bold(), location);
        }
        Ok(SubmitOutcome::Disconnected) => return Ok(()),
        Err(e) => {
            let message = orchestrator.status().error.unwrap_or_else(|| e.to_string());
            println!("{} {}", stamp(), message.red());
            return Err(e);
        }
    }
    let _ = phases.borrow_and_update();
    let _ = locations.borrow_and_update();

    println!("Watching session, press Ctrl-C to disconnect");
    loop {
        tokio::select! {
            changed = phases.changed() => {
                if changed.is_err() {
                    break;
                }
                let phase = *phases.borrow_and_update();
                let label = match phase {
                    BringUpPhase::Ready => phase.to_string().green(),
                    BringUpPhase::Failed => phase.to_string().red(),
                    _ => phase.to_string().yellow(),
                };
                println!("{} {}", stamp(), label);
            }
            changed = locations.changed() => {
                if changed.is_err() {
                    break;
                }
                let location = locations.borrow_and_update().clone();
                println!("{} {}", stamp(), location);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, disconnecting");
                break;
            }
        }
    }

    orchestrator.shutdown().await;
    println!("{} Disconnected", stamp());
    Ok(())
}

fn stamp() -> colored::ColoredString {
    Local::now().format("%H:%M:%S").to_string().dimmed()
}
