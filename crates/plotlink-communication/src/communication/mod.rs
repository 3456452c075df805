//! Serial links to the plotter controller
//!
//! - `serial`: port discovery and the transport abstraction
//! - `connection`: one open port with its writer and reader workers
//! - `manager`: the per-port registry with open-or-reuse semantics

pub mod connection;
pub mod manager;
pub mod serial;

pub use connection::Connection;
pub use manager::{ConnectionManager, OnOpenHook};
pub use serial::{
    list_ports, NativePortOpener, PortKind, PortOpener, RealSerialPort, SerialPort,
    SerialPortInfo,
};
