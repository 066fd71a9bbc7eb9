//! Haptic companion library
//! BLE configuration and session protocol for the haptic wearable, plus the
//! presets, configuration and command layer of the companion CLI.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod preset;
pub mod state;
pub mod utils;

use std::io;

use anyhow::Result;
use log::{LevelFilter, info};

use crate::commands::{Cli, execute};
use crate::config::AppConfig;
use crate::state::AppState;

/// Sets up logging, loads the configuration, applies command-line overrides and runs the command.
pub async fn run(cli: Cli) -> Result<()> {
    // Installed before the config is read so its load messages are kept.
    logging::init(LevelFilter::Info);

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::load_config(&config_path).await?;

    if cli.accept_all {
        config.link.selection.accept_all = true;
    }
    if let Some(prefix) = cli.name_prefix.clone() {
        config.link.selection.name_prefix = Some(prefix);
    }
    if cli.no_notify {
        config.link.subscribe_notifications = false;
    }

    logging::set_level(config.level_filter());
    info!("Logging at {}", config.level_filter());

    let state = AppState::new(config).await?;
    let mut stdout = io::stdout();
    execute(&state, cli.command, &mut stdout).await
}
