//! Setup command implementation
//!
//! Interactive command for first-time console configuration with the router
//! password kept in the system keyring.

use dispatch_console_core::{
    auth::keyring,
    config::{
        toml_config::{get_config_path, load_config, save_settings_to_path},
        validate_address, validate_port,
    },
    error::{ConsoleError, KeyringError},
    types::{RouterPassword, DEFAULT_ADDRESS, DEFAULT_PORT},
};
use std::io::{self, Write};

/// Run the setup command
pub fn run_setup() -> Result<(), ConsoleError> {
    let config_path = get_config_path()?;

    println!("🔐 dispatch-console Setup");
    println!("=========================");
    println!();
    println!("This will configure the router connect settings.");
    println!("The router password will be stored in your system keyring.");
    println!("Settings will be saved to {}", config_path.display());
    println!();

    // Check if already configured
    if config_path.exists() {
        println!("⚠️  Existing configuration detected.");
        if !prompt_yes_no("Overwrite existing settings?", false)? {
            println!("Setup cancelled.");
            return Ok(());
        }
        println!();
    }

    // Check keyring availability
    check_keyring_availability()?;

    let mut settings = load_config()?.settings;

    println!("Router Connection:");
    println!("------------------");

    settings.address = loop {
        let address = prompt_optional("Router address", DEFAULT_ADDRESS)?;
        match validate_address(&address) {
            Ok(()) => break address,
            Err(e) => println!("❌ {}", e),
        }
    };

    settings.port = loop {
        let port = prompt_optional("Management port", &DEFAULT_PORT.to_string())?;
        match validate_port(&port) {
            Ok(port) => break port,
            Err(e) => println!("❌ {}", e),
        }
    };

    settings.username = prompt_optional("Username (empty for anonymous)", "")?;
    settings.autostart = prompt_yes_no("Connect automatically when started?", false)?;

    let password = if settings.username.is_empty() {
        None
    } else {
        let password = prompt_password("Password (empty to skip)")?;
        (!password.is_empty()).then(|| RouterPassword::new(password))
    };

    // Save configuration
    println!();
    println!("💾 Saving configuration...");

    save_settings_to_path(&settings, &config_path)?;

    if let Some(ref password) = password {
        keyring::store_password(&settings.username, password)?;
    }

    println!("✅ Setup complete!");
    println!();
    println!("You can now use:");
    println!("  dispatch-console check     - Test that the router is reachable");
    println!("  dispatch-console connect   - Open a management session");

    Ok(())
}

/// Check if the keyring is available
fn check_keyring_availability() -> Result<(), ConsoleError> {
    let probe = RouterPassword::new("test".to_string());
    match keyring::store_password("__dispatch_console_test__", &probe) {
        Ok(_) => {
            // Clean up test entry
            let _ = keyring::delete_password("__dispatch_console_test__");
            Ok(())
        }
        Err(ConsoleError::Keyring(_)) => {
            println!("❌ Keyring is not available or locked.");
            println!("Please ensure your system keyring is unlocked and available.");
            Err(ConsoleError::Keyring(KeyringError::ServiceUnavailable))
        }
        Err(e) => Err(e),
    }
}

/// Prompt for an optional value
fn prompt_optional(prompt: &str, default: &str) -> Result<String, ConsoleError> {
    let prompt_text = if default.is_empty() {
        format!("{}: ", prompt)
    } else {
        format!("{} [{}]: ", prompt, default)
    };
    let input = prompt_input(&prompt_text)?;

    if input.trim().is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.trim().to_string())
    }
}

/// Prompt for a password
fn prompt_password(prompt: &str) -> Result<String, ConsoleError> {
    let prompt_text = format!("{}: ", prompt);
    prompt_input(&prompt_text)
}

/// Prompt for yes/no with default
fn prompt_yes_no(prompt: &str, default_yes: bool) -> Result<bool, ConsoleError> {
    let default_indicator = if default_yes { "[Y/n]" } else { "[y/N]" };
    let prompt_text = format!("{} {}: ", prompt, default_indicator);

    loop {
        let input = prompt_input(&prompt_text)?.to_lowercase();

        match input.as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "" => return Ok(default_yes),
            _ => {
                println!("Please enter 'y' for yes or 'n' for no.");
                continue;
            }
        }
    }
}

/// Low-level input prompting
fn prompt_input(prompt: &str) -> Result<String, ConsoleError> {
    print!("{}", prompt);
    io::stdout().flush().map_err(ConsoleError::Io)?;

    let mut input = String::new();
    io::stdin().read_line(&mut input).map_err(ConsoleError::Io)?;

    Ok(input.trim_end().to_string())
}
