//! Coding with Chrome robot driver CLI
//!
//! Talks to LEGO EV3, Sphero and Makeblock robots over serial, RFCOMM or
//! Bluetooth LE.

use clap::Parser;
use tracing_subscriber::EnvFilter;

// CLI definitions
mod cli;
use cli::{Cli, Commands, ConfigCommands};

// Command handlers
mod commands;

use cwc_driver::config::Config;
use cwc_driver::target::DeviceTarget;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    // RUST_LOG wins over --log-level, which wins over the config file
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
        EnvFilter::try_new(level)
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let printer = commands::create_printer_config(cli.monitor, cli.hex, cli.filter.as_deref())?;
    let options = commands::DeviceOptions {
        target: DeviceTarget::from_flags(cli.dry_run, cli.port.clone(), cli.ble, &config),
        printer,
        config: config.clone(),
    };

    match cli.command {
        // === Offline Commands ===
        Commands::List => {
            commands::list::list(&config).await?;
        }
        Commands::Commands { robot } => {
            commands::list::commands(robot)?;
        }
        Commands::Encode {
            robot,
            command,
            params,
        } => {
            commands::encode::encode(robot, &command, &params)?;
        }

        // === Robot Commands ===
        Commands::Run {
            robot,
            command,
            params,
        } => {
            commands::run::run(robot, &command, &params, &options).await?;
        }
        Commands::Monitor { robot, seconds } => {
            let Some(robot) = robot.or(config.default_robot) else {
                return Err("no robot given and no default_robot configured".into());
            };
            commands::monitor::monitor(robot, seconds, &options).await?;
        }

        // === Config ===
        Commands::Config(ConfigCommands::Show) => {
            commands::config::show(&config, &config_path)?;
        }
        Commands::Config(ConfigCommands::Init { force }) => {
            commands::config::init(&config, &config_path, force)?;
        }
    }

    Ok(())
}
