//! # plotlink Communication
//!
//! Serial transport, line codec, and connection management for a plotter
//! controller on a direct USB/serial link.
//!
//! - [`protocol`]: motion command encoding and telemetry decoding
//! - [`communication`]: port discovery, per-port connections, the registry
//! - [`motion`]: the command surface a front end calls

pub mod communication;
pub mod motion;
pub mod protocol;

pub use communication::{
    list_ports, Connection, ConnectionManager, NativePortOpener, PortKind, PortOpener,
    SerialPort, SerialPortInfo,
};
pub use motion::{FixedPort, MotionController, PortSelection, SharedSelection};
pub use protocol::{decoder_for, FrameDecoder, MotionCommand};
