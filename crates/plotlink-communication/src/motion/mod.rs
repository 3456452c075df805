//! Motion command API
//!
//! [`MotionController`] is the surface a front end drives. Every operation
//! resolves the selected port, validates the command against the machine
//! limits, opens the port (or reuses the open connection) and queues the
//! encoded line. Write completion is reported through link events only.

pub mod limits;

use crate::communication::ConnectionManager;
use crate::protocol::MotionCommand;
use parking_lot::RwLock;
use plotlink_core::{CommandError, PortId, Result};
use plotlink_settings::MachineSettings;
use std::sync::Arc;

pub use limits::validate;

/// Supplies the port commands are addressed to
pub trait PortSelection: Send + Sync {
    /// The currently selected port, if any
    fn selected_port(&self) -> Option<PortId>;
}

/// Always selects the same port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPort(pub PortId);

impl PortSelection for FixedPort {
    fn selected_port(&self) -> Option<PortId> {
        Some(self.0.clone())
    }
}

/// A selection another thread can change, e.g. from a port dropdown
#[derive(Debug, Default)]
pub struct SharedSelection {
    port: RwLock<Option<PortId>>,
}

impl SharedSelection {
    /// Start with nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `port`
    pub fn select(&self, port: impl Into<PortId>) {
        *self.port.write() = Some(port.into());
    }

    /// Clear the selection
    pub fn clear(&self) {
        *self.port.write() = None;
    }
}

impl PortSelection for SharedSelection {
    fn selected_port(&self) -> Option<PortId> {
        self.port.read().clone()
    }
}

/// Sends motion commands to the selected port
pub struct MotionController {
    manager: Arc<ConnectionManager>,
    selection: Arc<dyn PortSelection>,
    machine: MachineSettings,
}

impl MotionController {
    /// Create a controller over `manager`
    ///
    /// If `machine.zero_on_open` is set, every newly opened port is told its
    /// current position before any other command; see
    /// [`zero_on_open`](Self::zero_on_open). Fails if that position is
    /// rejected by the machine limits.
    pub fn new(
        manager: Arc<ConnectionManager>,
        selection: Arc<dyn PortSelection>,
        machine: MachineSettings,
    ) -> Result<Self> {
        let controller = Self {
            manager,
            selection,
            machine,
        };

        if let Some((x, y)) = controller.machine.zero_on_open {
            controller.zero_on_open(x, y)?;
        }

        Ok(controller)
    }

    /// The underlying connection manager
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Machine limits commands are checked against
    pub fn machine(&self) -> &MachineSettings {
        &self.machine
    }

    /// Move to (x, y)
    pub fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.execute(MotionCommand::move_to(x, y))
    }

    /// Declare the current position to be (x, y)
    pub fn set_zero(&self, x: i32, y: i32) -> Result<()> {
        self.execute(MotionCommand::set_zero(x, y))
    }

    /// Halt motion
    pub fn stop(&self) -> Result<()> {
        self.execute(MotionCommand::Stop)
    }

    /// Set motor power, level 1 when `None`
    pub fn set_power(&self, level: Option<u8>) -> Result<()> {
        self.execute(MotionCommand::set_power(level))
    }

    /// Set step interval, 600 when `None`
    pub fn set_speed(&self, interval: Option<u32>) -> Result<()> {
        self.execute(MotionCommand::set_speed(interval))
    }

    /// Validate and send any command
    pub fn execute(&self, command: MotionCommand) -> Result<()> {
        let port = self
            .selection
            .selected_port()
            .ok_or(CommandError::NoPortSelected)?;
        let command = validate(command, &self.machine)?;

        let connection = self.manager.open(&port)?;
        tracing::debug!("Queueing {} for {}", command, port);
        connection.send(command.encode())
    }

    /// Close the selected port
    pub fn close(&self) -> Result<()> {
        let port = self
            .selection
            .selected_port()
            .ok_or(CommandError::NoPortSelected)?;
        self.manager.close(&port);
        Ok(())
    }

    /// Send `G92 X{x} Y{y}` as the first line on every newly opened port
    ///
    /// The position is checked against the machine limits now, not at open.
    /// This installs the manager's on-open hook, replacing any hook another
    /// user of the same manager had set.
    pub fn zero_on_open(&self, x: i32, y: i32) -> Result<()> {
        let line = validate(MotionCommand::set_zero(x, y), &self.machine)?.encode();
        let replaced = self.manager.set_on_open(move |connection| {
            if let Err(e) = connection.send(line.as_str()) {
                tracing::warn!("Failed to queue zero for {}: {}", connection.port(), e);
            }
        });

        if replaced.is_some() {
            tracing::warn!("Replaced an existing on-open hook with zero at ({}, {})", x, y);
        }
        Ok(())
    }
}
