//! plotlink Settings Crate
//!
//! Handles the link configuration: serial parameters, machine travel limits,
//! and telemetry framing, loaded from TOML or JSON files.

pub mod config;
pub mod error;

pub use config::{
    BoundsPolicy, Config, FramingMode, MachineSettings, SerialSettings, TelemetrySettings,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
