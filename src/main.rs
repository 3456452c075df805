//! Command-line front end for plotlink
//!
//! ```bash
//! plotlink ports
//! plotlink --port /dev/ttyUSB0 power 2
//! plotlink --port /dev/ttyUSB0 move 1000 2000
//! plotlink --port /dev/ttyUSB0 monitor
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use plotlink::{
    init_logging_with, list_ports, motion, Config, ConnectionError, ConnectionManager, LinkEvent,
    LogFormat, MotionCommand, MotionController, PortId, SharedSelection, BUILD_DATE, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How long to wait for a queued line to reach the device
const WRITE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "plotlink")]
#[command(about = "Drive a plotter controller over a serial link", long_about = None)]
#[command(version)]
struct Cli {
    /// Serial port to use (overrides the configured port)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Configuration file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports
    Ports {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move to an absolute position
    Move {
        /// Target X
        #[arg(allow_hyphen_values = true)]
        x: i32,
        /// Target Y
        #[arg(allow_hyphen_values = true)]
        y: i32,
    },

    /// Declare the current position (defaults to the origin)
    Zero {
        #[arg(default_value_t = 0)]
        x: i32,
        #[arg(default_value_t = 0)]
        y: i32,
    },

    /// Halt motion
    Stop,

    /// Set motor power level (1-4)
    Power { level: Option<u8> },

    /// Set step interval; smaller is faster
    Speed { interval: Option<u32> },

    /// Print telemetry frames as JSON until interrupted
    Monitor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging_with(format)?;
    tracing::debug!("plotlink {} (built {})", VERSION, BUILD_DATE);

    let config = load_config(cli.config.as_deref())?;

    let command = match cli.command {
        Commands::Ports { json } => return print_ports(json),
        Commands::Monitor => {
            let port = selected_port(cli.port, &config)?;
            return monitor(&config, port).await;
        }
        Commands::Move { x, y } => MotionCommand::move_to(x, y),
        Commands::Zero { x, y } => MotionCommand::set_zero(x, y),
        Commands::Stop => MotionCommand::Stop,
        Commands::Power { level } => MotionCommand::set_power(level),
        Commands::Speed { interval } => MotionCommand::set_speed(interval),
    };

    let port = selected_port(cli.port, &config)?;
    send_command(&config, port, command).await
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => match Config::default_path() {
            Ok(path) => Config::load_or_default(&path)
                .with_context(|| format!("loading {}", path.display()))?,
            Err(e) => {
                tracing::debug!("Using default configuration: {}", e);
                Config::default()
            }
        },
    };
    Ok(config)
}

fn selected_port(flag: Option<String>, config: &Config) -> Result<PortId> {
    match flag.or_else(|| config.serial.port.clone()) {
        Some(port) => Ok(PortId::new(port)),
        None => bail!("no port given; pass --port or set serial.port in the config file"),
    }
}

fn print_ports(json: bool) -> Result<()> {
    let ports = list_ports()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in &ports {
        let marker = if port.looks_like_controller() { "*" } else { " " };
        println!("{} {:<24} {}", marker, port.port_name, port.description);
    }
    Ok(())
}

async fn send_command(config: &Config, port: PortId, command: MotionCommand) -> Result<()> {
    let manager = Arc::new(ConnectionManager::from_config(config));
    let selection = Arc::new(SharedSelection::new());
    selection.select(port.clone());
    let controller = MotionController::new(manager.clone(), selection, config.machine.clone())?;

    // Validated up front so the confirmation matches a clamped line.
    let line = motion::validate(command, &config.machine)?.encode();
    let mut events = manager.subscribe();
    controller.execute(command)?;

    let outcome = tokio::time::timeout(WRITE_TIMEOUT, wait_for_write(&mut events, &line)).await;
    controller.close()?;

    match outcome {
        Ok(Ok(())) => {
            println!("{}", line.trim_end());
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => bail!("timed out writing to {}", port),
    }
}

async fn wait_for_write(events: &mut broadcast::Receiver<LinkEvent>, line: &str) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(LinkEvent::CommandSent { line: sent, .. }) if sent == line => return Ok(()),
            Ok(LinkEvent::WriteFailed {
                line: failed,
                reason,
                port,
            }) if failed == line => {
                return Err(ConnectionError::WriteFailed {
                    port: port.to_string(),
                    reason,
                }
                .into())
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => bail!("event channel closed"),
        }
    }
}

async fn monitor(config: &Config, port: PortId) -> Result<()> {
    let manager = ConnectionManager::from_config(config);
    let mut events = manager.subscribe();
    manager.open(&port)?;
    tracing::info!("Monitoring {}; press Ctrl-C to stop", port);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(LinkEvent::Telemetry { frame, .. }) => println!("{}", frame.to_json_pretty()),
                Ok(LinkEvent::PortError { reason, .. }) => bail!("{} failed: {}", port, reason),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Skipped {} telemetry events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    manager.close(&port);
    Ok(())
}
