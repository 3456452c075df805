//! # plotlink Core
//!
//! Core types, errors, and events shared by the plotlink crates.
//! Provides the port identifier, telemetry frame model, fixed protocol
//! constants, and the broadcast dispatcher used to surface link events.

pub mod constants;
pub mod core;
pub mod data;
pub mod error;

pub use self::core::event::{EventDispatcher, LinkEvent};

pub use data::{PortId, TelemetryFrame};

pub use error::{CommandError, ConnectionError, Error, Result};
