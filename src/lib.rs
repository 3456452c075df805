//! # plotlink
//!
//! Serial command and telemetry link for a G-code driven plotter controller.
//!
//! ## Architecture
//!
//! plotlink is organized as a workspace with multiple crates:
//!
//! 1. **plotlink-core** - Errors, constants, port/telemetry types, link events
//! 2. **plotlink-settings** - Serial, machine and telemetry configuration
//! 3. **plotlink-communication** - Port discovery, line codec, connections, motion API
//! 4. **plotlink** - Re-exports, logging setup and the command-line front end
//!
//! ## Example
//!
//! ```no_run
//! use plotlink::{Config, ConnectionManager, FixedPort, MotionController, PortId};
//! use std::sync::Arc;
//!
//! # fn main() -> plotlink::Result<()> {
//! let config = Config::default();
//! let manager = Arc::new(ConnectionManager::from_config(&config));
//! let port = Arc::new(FixedPort(PortId::from("/dev/ttyUSB0")));
//! let motion = MotionController::new(manager, port, config.machine.clone())?;
//!
//! motion.set_power(Some(2))?;
//! motion.move_to(1_000, 2_000)?;
//! # Ok(())
//! # }
//! ```

pub use plotlink_communication::{
    communication, list_ports, motion, protocol, Connection, ConnectionManager, FixedPort,
    MotionCommand, MotionController, NativePortOpener, PortKind, PortOpener, PortSelection,
    SerialPort, SerialPortInfo, SharedSelection,
};

pub use plotlink_core::{
    constants, CommandError, ConnectionError, Error, EventDispatcher, LinkEvent, PortId, Result,
    TelemetryFrame,
};

pub use plotlink_settings::{
    BoundsPolicy, Config, ConfigError, FramingMode, MachineSettings, SerialSettings,
    SettingsError, TelemetrySettings,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, multi-line records
    #[default]
    Pretty,
    /// One JSON object per record
    Json,
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Pretty formatted output on stderr, leaving stdout for command output
/// - RUST_LOG environment variable support, INFO when unset
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with(LogFormat::default())
}

/// Initialize logging in the given format
pub fn init_logging_with(format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    let result = match format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_names(true)
                .with_line_number(true)
                .pretty();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .json();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}
