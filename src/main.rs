//! dispatch-console - router management console bring-up
//!
//! A command-line console that test-connects to a message router, opens a
//! management session, waits for the schema and the first topology snapshot
//! and then hands off to the console screens.

use clap::{CommandFactory, Parser, Subcommand};
use dispatch_console_core::{error::ConsoleError, init_logging};

mod cli;

#[derive(Parser)]
#[command(name = "dispatch-console")]
#[command(about = "Management console bring-up for message routers")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure connect settings and store the router password
    Setup,
    /// Show or change the stored connect settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Test-connect to the router without opening a session
    Check {
        /// Router address (defaults to the stored setting, then localhost)
        #[arg(long)]
        address: Option<String>,
        /// Router management port (defaults to the stored setting, then 5673)
        #[arg(long)]
        port: Option<String>,
    },
    /// Bring up a management session and watch it until Ctrl-C
    Connect {
        /// Router address (defaults to the stored setting, then localhost)
        #[arg(long)]
        address: Option<String>,
        /// Router management port (defaults to the stored setting, then 5673)
        #[arg(long)]
        port: Option<String>,
        /// Console location to start from, e.g. "/connect?org=topology"
        #[arg(long)]
        path: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the stored settings
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change stored settings; unspecified fields keep their value
    Set {
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        autostart: Option<bool>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let result = match cli.command {
        Some(Commands::Setup) => cli::setup::run_setup(),
        Some(Commands::Settings { action }) => match action {
            SettingsCommands::Show { json } => cli::settings::run_show(json),
            SettingsCommands::Set {
                address,
                port,
                username,
                autostart,
            } => cli::settings::run_set(cli::settings::SettingsUpdate {
                address,
                port,
                username,
                autostart,
            }),
        },
        Some(Commands::Check { address, port }) => cli::check::run_check(address, port),
        Some(Commands::Connect {
            address,
            port,
            path,
        }) => cli::connect::run_connect(cli::connect::ConnectArgs {
            address,
            port,
            path,
        }),
        None => run_default(),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                ConsoleError::Config(_) | ConsoleError::Toml(_) | ConsoleError::TomlSerialize(_) => 2,
                // Keyring errors (exit code 2 for configuration/setup issues)
                ConsoleError::Keyring(_) => 2,
                // Bad form input (exit code 2)
                ConsoleError::Validation(_) => 2,
                // Router unreachable, session failures and IO (exit code 1 - runtime)
                ConsoleError::Connection(_) | ConsoleError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}

/// With no command, connect if autostart is on, else print usage
fn run_default() -> Result<(), ConsoleError> {
    let config = dispatch_console_core::config::toml_config::load_config()?;
    if config.settings.autostart {
        return cli::connect::run_connect(cli::connect::ConnectArgs::default());
    }

    Cli::command().print_help()?;
    println!();
    Ok(())
}
