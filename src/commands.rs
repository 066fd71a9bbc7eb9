//! CLI commands
//! This module defines every command that can be invoked from the command line.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout_at};

use crate::core::BluetoothManager;
use crate::core::bluetooth::codec::WireValue;
use crate::core::bluetooth::parameters::Parameter;
use crate::preset::PresetConfig;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "haptic-companion", version, about = "Configure a haptic wearable over Bluetooth LE")]
pub struct Cli {
    /// Config file, defaults to the platform config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Select the device by advertised name prefix instead of by service
    #[arg(long, global = true)]
    pub name_prefix: Option<String>,
    /// Connect to any device (diagnostics)
    #[arg(long, global = true)]
    pub accept_all: bool,
    /// Do not subscribe to status notifications
    #[arg(long, global = true)]
    pub no_notify: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the device identity and full configuration as JSON
    Status,
    /// Read one parameter
    Get { parameter: Parameter },
    /// Write one parameter
    Set { parameter: Parameter, value: String },
    /// Print elapsed-time and battery notifications
    Monitor {
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Feed values through the debounced writer like a slider drag, then commit the last one
    Sweep {
        parameter: Parameter,
        #[arg(required = true)]
        values: Vec<String>,
        #[arg(long, default_value_t = 100)]
        step_ms: u64,
    },
    /// Manage saved presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum PresetAction {
    List,
    /// Save the device's current configuration under a name
    Save { name: String },
    /// Write a saved preset to the device
    Apply { id: String },
    Delete { id: String },
    Import { file: PathBuf },
    Export { file: PathBuf },
}

impl Command {
    fn needs_device(&self) -> bool {
        match self {
            Command::Preset { action } => {
                matches!(action, PresetAction::Save { .. } | PresetAction::Apply { .. })
            }
            _ => true,
        }
    }
}

/// Runs one command.
///
/// # Arguments
/// * `state` - The application state
/// * `command` - The parsed command
/// * `out` - Where command output is written
///
/// Device commands connect first and always disconnect gracefully afterwards,
/// whether or not the command itself succeeded.
pub async fn execute(state: &AppState, command: Command, out: &mut dyn Write) -> Result<()> {
    if !command.needs_device() {
        return match command {
            Command::Preset { action } => preset_offline(state, action, out).await,
            _ => Ok(()),
        };
    }

    let manager = state.bluetooth_manager().await?;
    manager.connect().await.context("Failed to connect")?;
    let result = device_command(state, &manager, command, out).await;
    manager.disconnect().await;
    result
}

async fn device_command(
    state: &AppState,
    manager: &BluetoothManager,
    command: Command,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Status => status(manager, out).await,
        Command::Get { parameter } => {
            let value = manager.api().read(parameter).await?;
            writeln!(out, "{} = {}", parameter, value)?;
            Ok(())
        }
        Command::Set { parameter, value } => {
            let value = parse_value(parameter, &value)?;
            manager.api().write(parameter, value).await?;
            writeln!(out, "{} set to {}", parameter, value)?;
            Ok(())
        }
        Command::Monitor { seconds } => monitor(manager, Duration::from_secs(seconds), out).await,
        Command::Sweep {
            parameter,
            values,
            step_ms,
        } => sweep(manager, parameter, &values, Duration::from_millis(step_ms), out).await,
        Command::Preset { action } => preset_on_device(state, manager, action, out).await,
    }
}

async fn status(manager: &BluetoothManager, out: &mut dyn Write) -> Result<()> {
    let config = manager.config().await?;
    let report = serde_json::json!({
        "state": manager.state(),
        "device": manager.device(),
        "config": &*config,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn parse_value(parameter: Parameter, input: &str) -> Result<WireValue> {
    WireValue::parse(parameter.descriptor().kind, input)
        .map_err(|e| anyhow!("Invalid value for {}: {}", parameter, e))
}

async fn monitor(manager: &BluetoothManager, duration: Duration, out: &mut dyn Write) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut subscriptions = Vec::new();
    for parameter in [Parameter::SessionElapsed, Parameter::BatteryLevel, Parameter::MotorMode] {
        let tx = tx.clone();
        subscriptions.push(manager.subscribe(
            parameter,
            Arc::new(move |value: &WireValue| {
                let _ = tx.send(format!("{} = {}", parameter, value));
            }),
        ));
    }
    drop(tx);

    if !manager.link_config().subscribe_notifications {
        warn!("Notifications are disabled, nothing will be received");
    }
    info!("Monitoring notifications for {:?}", duration);

    let deadline = Instant::now() + duration;
    while let Ok(Some(line)) = timeout_at(deadline, rx.recv()).await {
        writeln!(out, "{}", line)?;
    }

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    Ok(())
}

async fn sweep(
    manager: &BluetoothManager,
    parameter: Parameter,
    values: &[String],
    step: Duration,
    out: &mut dyn Write,
) -> Result<()> {
    let values = values
        .iter()
        .map(|v| parse_value(parameter, v))
        .collect::<Result<Vec<_>>>()?;
    let Some(last) = values.last().copied() else {
        bail!("No values given");
    };
    // Reject bad values before any of them is scheduled.
    for value in &values {
        parameter.descriptor().validate(value)?;
    }

    let writer = manager.debounced_writer(parameter);
    writer.on_interaction_start();
    for value in values {
        writer.on_value(value);
        sleep(step).await;
    }
    writer.commit(last).await?;
    writeln!(out, "{} committed at {}", parameter, last)?;
    Ok(())
}

async fn preset_offline(state: &AppState, action: PresetAction, out: &mut dyn Write) -> Result<()> {
    let mut presets = state.presets.lock().await;
    match action {
        PresetAction::List => {
            for record in presets.presets() {
                writeln!(
                    out,
                    "{}  {}  {}",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.name
                )?;
            }
        }
        PresetAction::Delete { id } => {
            let removed = presets
                .remove(&id)
                .ok_or_else(|| anyhow!("No preset with id {}", id))?;
            presets.save().await?;
            writeln!(out, "Deleted preset {:?}", removed.name)?;
        }
        PresetAction::Import { file } => {
            let count = presets.import(&file).await?;
            presets.save().await?;
            writeln!(out, "Imported {} preset(s)", count)?;
        }
        PresetAction::Export { file } => {
            presets.export(&file).await?;
            writeln!(out, "Exported {} preset(s) to {}", presets.presets().len(), file.display())?;
        }
        PresetAction::Save { .. } | PresetAction::Apply { .. } => bail!("Preset action needs a device"),
    }
    Ok(())
}

async fn preset_on_device(
    state: &AppState,
    manager: &BluetoothManager,
    action: PresetAction,
    out: &mut dyn Write,
) -> Result<()> {
    let mut presets = state.presets.lock().await;
    match action {
        PresetAction::Save { name } => {
            let current = manager.read_all().await?;
            let id = presets.add(name, PresetConfig::from(&*current)).id.clone();
            presets.save().await?;
            writeln!(out, "Saved preset {}", id)?;
        }
        PresetAction::Apply { id } => {
            let record = presets
                .get(&id)
                .ok_or_else(|| anyhow!("No preset with id {}", id))?;
            let applied = manager.apply_preset(&record.config).await?;
            match applied.motor_mode {
                Some(mode) => writeln!(out, "Applied preset {:?}, motor {}", record.name, mode)?,
                None => writeln!(out, "Applied preset {:?}", record.name)?,
            }
        }
        other => {
            drop(presets);
            return preset_offline(state, other, out).await;
        }
    }
    Ok(())
}
