//! Error handling for plotlink
//!
//! Provides error types for the layers of the link:
//! - Connection errors (discovery, open, write, close)
//! - Command errors (validation of motion commands before they are written)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors related to serial port discovery and the lifetime of
/// a connection. These are reported through link events as well as returned
/// where an operation can fail synchronously.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Serial port enumeration failed
    #[error("Failed to enumerate ports: {reason}")]
    Discovery {
        /// The reason reported by the platform.
        reason: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// No connection is registered for the port
    #[error("Port not open: {port}")]
    NotOpen {
        /// The port that has no connection.
        port: String,
    },

    /// A write to the port failed
    #[error("Write to {port} failed: {reason}")]
    WriteFailed {
        /// The port the write was addressed to.
        port: String,
        /// The reason the write failed.
        reason: String,
    },

    /// Closing the port reported an error
    #[error("Failed to close port {port}: {reason}")]
    CloseFailed {
        /// The port being closed.
        port: String,
        /// The reason the close failed.
        reason: String,
    },

    /// Invalid serial parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Command error type
///
/// Raised when a motion command cannot be sent as requested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Coordinate outside the machine travel
    #[error("{axis} coordinate {value} out of range 0..={max}")]
    OutOfRange {
        /// The axis letter.
        axis: char,
        /// The requested coordinate.
        value: i32,
        /// The largest allowed coordinate.
        max: i32,
    },

    /// Power level outside the supported range
    #[error("Power level {level} out of range {min}..={max}")]
    InvalidPower {
        /// The requested level.
        level: u8,
        /// The lowest allowed level.
        min: u8,
        /// The highest allowed level.
        max: u8,
    },

    /// Speed interval must be positive
    #[error("Speed interval must be > 0")]
    InvalidSpeed,

    /// The caller has not selected a port
    #[error("No port selected")]
    NoPortSelected,

    /// An echoed command line could not be parsed
    #[error("Cannot parse command line '{line}': {reason}")]
    Parse {
        /// The offending line.
        line: String,
        /// Why parsing failed.
        reason: String,
    },
}

/// Main error type for plotlink
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a command error
    pub fn is_command_error(&self) -> bool {
        matches!(self, Error::Command(_))
    }

    /// Check if this error means the port has no open connection
    pub fn is_not_open(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::NotOpen { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::FailedToOpen {
            port: "COM3".to_string(),
            reason: "access denied".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to open port COM3: access denied");

        let err = ConnectionError::NotOpen {
            port: "/dev/ttyUSB0".to_string(),
        };
        assert_eq!(err.to_string(), "Port not open: /dev/ttyUSB0");

        let err = ConnectionError::WriteFailed {
            port: "COM3".to_string(),
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.to_string(), "Write to COM3 failed: broken pipe");
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::OutOfRange {
            axis: 'X',
            value: 60000,
            max: 55000,
        };
        assert_eq!(err.to_string(), "X coordinate 60000 out of range 0..=55000");
        assert_eq!(CommandError::NoPortSelected.to_string(), "No port selected");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ConnectionError::NotOpen {
            port: "COM1".to_string(),
        }
        .into();
        assert!(err.is_connection_error());
        assert!(err.is_not_open());

        let err: Error = CommandError::InvalidSpeed.into();
        assert!(err.is_command_error());
        assert!(!err.is_not_open());
    }
}
