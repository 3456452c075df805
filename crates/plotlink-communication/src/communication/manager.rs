//! Connection registry
//!
//! [`ConnectionManager`] keeps at most one live [`Connection`] per port.
//! Opening an already open port hands back the existing connection; closing
//! always removes the entry, even when the driver reports an error.

use super::connection::{Connection, Registry};
use super::serial::{NativePortOpener, PortOpener};
use crate::protocol::decoder_for;
use parking_lot::{Mutex, RwLock};
use plotlink_core::{ConnectionError, EventDispatcher, LinkEvent, PortId, Result};
use plotlink_settings::{Config, SerialSettings, TelemetrySettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Callback run once for every newly opened connection
pub type OnOpenHook = Arc<dyn Fn(&Connection) + Send + Sync>;

/// Owns the open connections, keyed by port
pub struct ConnectionManager {
    serial: SerialSettings,
    telemetry: TelemetrySettings,
    opener: Arc<dyn PortOpener>,
    events: EventDispatcher,
    registry: Registry,
    on_open: RwLock<Option<OnOpenHook>>,
}

impl ConnectionManager {
    /// Create a manager that opens ports through `opener`
    pub fn new(
        serial: SerialSettings,
        telemetry: TelemetrySettings,
        opener: Arc<dyn PortOpener>,
    ) -> Self {
        let events = EventDispatcher::new(telemetry.event_buffer_size);
        Self {
            serial,
            telemetry,
            opener,
            events,
            registry: Arc::new(Mutex::new(HashMap::new())),
            on_open: RwLock::new(None),
        }
    }

    /// Create a manager for real serial ports from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_opener(config, Arc::new(NativePortOpener))
    }

    /// Create a manager from a configuration with a custom opener
    pub fn with_opener(config: &Config, opener: Arc<dyn PortOpener>) -> Self {
        Self::new(config.serial.clone(), config.telemetry.clone(), opener)
    }

    /// The dispatcher link events are published on
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to link events
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Run `hook` on each new connection before anyone else can use it
    ///
    /// The hook runs while the registry is locked and before the connection
    /// is registered, so anything it queues is written ahead of every other
    /// command on that port. It must not call back into the manager.
    /// Reused connections do not run it.
    ///
    /// Replaces any hook already installed and returns it.
    pub fn set_on_open(
        &self,
        hook: impl Fn(&Connection) + Send + Sync + 'static,
    ) -> Option<OnOpenHook> {
        self.on_open.write().replace(Arc::new(hook))
    }

    /// Remove the on-open hook, returning it
    pub fn clear_on_open(&self) -> Option<OnOpenHook> {
        self.on_open.write().take()
    }

    /// Open `port`, or return the connection that is already open
    pub fn open(&self, port: &PortId) -> Result<Arc<Connection>> {
        // The lock is held across the whole open so two opens of the same
        // port cannot both reach the driver.
        let mut registry = self.registry.lock();

        if let Some(existing) = registry.get(port) {
            tracing::trace!("Reusing connection {} for {}", existing.id(), port);
            return Ok(existing.clone());
        }

        let connection = self
            .opener
            .open(port, &self.serial)
            .and_then(|transport| {
                Connection::start(
                    port.clone(),
                    transport,
                    self.serial.baud_rate,
                    decoder_for(&self.telemetry),
                    self.events.clone(),
                    Arc::downgrade(&self.registry),
                )
            })
            .inspect_err(|e| {
                tracing::warn!("Error opening {}: {}", port, e);
                self.events.publish(LinkEvent::OpenFailed {
                    port: port.clone(),
                    reason: e.to_string(),
                });
            })?;

        let hook = self.on_open.read().clone();
        if let Some(hook) = hook {
            hook(&connection);
        }

        registry.insert(port.clone(), connection.clone());
        drop(registry);

        tracing::info!(
            "Opened {} at {} baud ({})",
            port,
            connection.baud_rate(),
            connection.id()
        );
        self.events.publish(LinkEvent::Opened {
            port: port.clone(),
            connection_id: connection.id(),
        });

        Ok(connection)
    }

    /// Queue `line` on the open connection for `port`
    pub fn send(&self, port: &PortId, line: &str) -> Result<()> {
        let connection = self
            .connection(port)
            .ok_or_else(|| ConnectionError::NotOpen {
                port: port.to_string(),
            })?;
        connection.send(line)
    }

    /// Close `port`; a no-op if it is not open
    pub fn close(&self, port: &PortId) {
        let Some(connection) = self.registry.lock().remove(port) else {
            tracing::trace!("Close of {} ignored, not open", port);
            return;
        };

        match connection.shutdown() {
            Ok(()) => {
                tracing::info!("Closed {}", port);
                self.events.publish(LinkEvent::Closed(port.clone()));
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.events.publish(LinkEvent::CloseFailed {
                    port: port.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Close every open port
    pub fn close_all(&self) {
        for port in self.open_ports() {
            self.close(&port);
        }
    }

    /// True if a connection is registered for `port`
    pub fn is_open(&self, port: &PortId) -> bool {
        self.registry.lock().contains_key(port)
    }

    /// The registered connection for `port`
    pub fn connection(&self, port: &PortId) -> Option<Arc<Connection>> {
        self.registry.lock().get(port).cloned()
    }

    /// Ports with a registered connection, sorted
    pub fn open_ports(&self) -> Vec<PortId> {
        let mut ports: Vec<PortId> = self.registry.lock().keys().cloned().collect();
        ports.sort();
        ports
    }

    /// Serial settings new connections are opened with
    pub fn serial_settings(&self) -> &SerialSettings {
        &self.serial
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}
