//! Configuration for the plotter link
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats stored in the platform config directory.
//!
//! Configuration is organized into logical sections:
//! - Serial settings (port, baud rate, framing of the UART)
//! - Machine settings (travel limits and how out-of-range targets are handled)
//! - Telemetry settings (how device feedback is framed and buffered)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use plotlink_core::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_EVENT_BUFFER, DEFAULT_MAX_PENDING_BYTES, FRAME_DELIMITER, X_MAX,
    Y_MAX,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Last used port, if any
    pub port: Option<String>,
    /// Baud rate for the controller
    pub baud_rate: u32,
    /// Read timeout in milliseconds; keeps the reader responsive to close
    pub read_timeout_ms: u64,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Hardware flow control
    pub flow_control: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 10,
            data_bits: 8,
            stop_bits: 1,
            flow_control: false,
        }
    }
}

/// What to do with a coordinate outside the machine travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Refuse to send the command
    #[default]
    Reject,
    /// Clamp the coordinate into range and send
    Clamp,
    /// Send the coordinate as given
    Unchecked,
}

impl std::fmt::Display for BoundsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Clamp => write!(f, "clamp"),
            Self::Unchecked => write!(f, "unchecked"),
        }
    }
}

/// Machine travel and position settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Largest X coordinate
    pub x_max: i32,
    /// Largest Y coordinate
    pub y_max: i32,
    /// Handling of out-of-range coordinates
    pub bounds_policy: BoundsPolicy,
    /// Position to declare with G92 right after a port is opened
    pub zero_on_open: Option<(i32, i32)>,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            x_max: X_MAX,
            y_max: Y_MAX,
            bounds_policy: BoundsPolicy::default(),
            zero_on_open: None,
        }
    }
}

/// How inbound telemetry is split into lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// Lines are separated by a sentinel character
    #[default]
    Delimiter,
    /// Lines are newline separated; only the latest complete line counts
    BufferedRead,
}

impl std::fmt::Display for FramingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delimiter => write!(f, "delimiter"),
            Self::BufferedRead => write!(f, "buffered_read"),
        }
    }
}

/// Telemetry decoding settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Line framing strategy
    pub framing: FramingMode,
    /// Sentinel for [`FramingMode::Delimiter`]
    pub delimiter: char,
    /// Undelimited input kept before it is discarded
    pub max_pending_bytes: usize,
    /// Capacity of the link event channel
    pub event_buffer_size: usize,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            framing: FramingMode::default(),
            delimiter: FRAME_DELIMITER,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
            event_buffer_size: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Complete link configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial connection settings
    pub serial: SerialSettings,
    /// Machine limits
    pub machine: MachineSettings,
    /// Telemetry decoding
    pub telemetry: TelemetrySettings,
}

impl Config {
    /// Create default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/plotlink/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no platform config directory".to_string())
        })?;
        Ok(dir.join("plotlink").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match extension(path) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(
                    ConfigError::UnsupportedFormat(other.unwrap_or("<none>").to_string()).into(),
                )
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or fall back to defaults if the file is missing
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
            other => {
                return Err(
                    ConfigError::UnsupportedFormat(other.unwrap_or("<none>").to_string()).into(),
                )
            }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud_rate == 0 {
            return Err(out_of_range("serial.baud_rate", self.serial.baud_rate));
        }

        if self.serial.read_timeout_ms == 0 {
            return Err(out_of_range(
                "serial.read_timeout_ms",
                self.serial.read_timeout_ms,
            ));
        }

        if !(5..=8).contains(&self.serial.data_bits) {
            return Err(out_of_range("serial.data_bits", self.serial.data_bits));
        }

        if !(1..=2).contains(&self.serial.stop_bits) {
            return Err(out_of_range("serial.stop_bits", self.serial.stop_bits));
        }

        if self.machine.x_max <= 0 {
            return Err(out_of_range("machine.x_max", self.machine.x_max));
        }

        if self.machine.y_max <= 0 {
            return Err(out_of_range("machine.y_max", self.machine.y_max));
        }

        // The delimiter must not collide with the line grammar itself.
        if matches!(self.telemetry.delimiter, '\n' | ',' | '=') {
            return Err(out_of_range(
                "telemetry.delimiter",
                self.telemetry.delimiter.escape_default(),
            ));
        }

        if self.telemetry.max_pending_bytes == 0 {
            return Err(out_of_range(
                "telemetry.max_pending_bytes",
                self.telemetry.max_pending_bytes,
            ));
        }

        if self.telemetry.event_buffer_size == 0 {
            return Err(out_of_range(
                "telemetry.event_buffer_size",
                self.telemetry.event_buffer_size,
            ));
        }

        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn out_of_range(key: &str, value: impl std::fmt::Display) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_firmware() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 112_000);
        assert_eq!(config.machine.x_max, 55_000);
        assert_eq!(config.machine.y_max, 21_000);
        assert_eq!(config.machine.bounds_policy, BoundsPolicy::Reject);
        assert_eq!(config.telemetry.framing, FramingMode::Delimiter);
        assert_eq!(config.telemetry.delimiter, '!');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.serial.baud_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange { ref key, .. }) if key == "serial.baud_rate"
        ));

        let mut config = Config::default();
        config.telemetry.delimiter = ',';
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.serial.stop_bits = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [machine]
            bounds_policy = "clamp"

            [telemetry]
            framing = "buffered_read"
            "#,
        )
        .unwrap();

        assert_eq!(config.machine.bounds_policy, BoundsPolicy::Clamp);
        assert_eq!(config.machine.x_max, 55_000);
        assert_eq!(config.telemetry.framing, FramingMode::BufferedRead);
        assert_eq!(config.serial.baud_rate, 112_000);
    }
}
