//! A single open link to one serial port
//!
//! Each [`Connection`] owns two worker threads over a shared transport:
//! - the writer drains a FIFO queue, so lines reach the device in the order
//!   they were sent, and closes the transport once the queue is closed and
//!   empty;
//! - the reader polls the port, feeds a [`FrameDecoder`], keeps the last
//!   accepted line and latest frame, and publishes telemetry events.
//!
//! Neither worker ever blocks the caller; outcomes are reported through the
//! [`EventDispatcher`].

use super::serial::SerialPort;
use crate::protocol::FrameDecoder;
use parking_lot::Mutex;
use plotlink_core::{ConnectionError, EventDispatcher, LinkEvent, PortId, Result, TelemetryFrame};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Connections registered by port
pub(crate) type Registry = Arc<Mutex<HashMap<PortId, Arc<Connection>>>>;

type WeakRegistry = Weak<Mutex<HashMap<PortId, Arc<Connection>>>>;

/// Pause between polls when the port had nothing to read
const IDLE_DELAY: Duration = Duration::from_millis(5);

/// Read buffer size
const READ_CHUNK: usize = 512;

type SharedTransport = Arc<Mutex<Box<dyn SerialPort>>>;

/// Handle to an open serial link
pub struct Connection {
    id: Uuid,
    port: PortId,
    baud_rate: u32,
    open: AtomicBool,
    transport: SharedTransport,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    writer: Mutex<Option<JoinHandle<io::Result<()>>>>,
    last_line: Mutex<Option<String>>,
    latest_frame: Mutex<Option<TelemetryFrame>>,
    events: EventDispatcher,
}

impl Connection {
    /// Wrap an already opened transport and start its workers
    pub(crate) fn start(
        port: PortId,
        transport: Box<dyn SerialPort>,
        baud_rate: u32,
        decoder: Box<dyn FrameDecoder>,
        events: EventDispatcher,
        registry: WeakRegistry,
    ) -> Result<Arc<Self>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            port,
            baud_rate,
            open: AtomicBool::new(true),
            transport: Arc::new(Mutex::new(transport)),
            outbound: Mutex::new(Some(tx)),
            writer: Mutex::new(None),
            last_line: Mutex::new(None),
            latest_frame: Mutex::new(None),
            events,
        });

        let writer = {
            let connection = connection.clone();
            thread::Builder::new()
                .name(format!("plotlink-tx-{}", connection.port))
                .spawn(move || run_writer(connection, rx))
        };

        let reader = writer.and_then(|handle| {
            *connection.writer.lock() = Some(handle);
            let connection = connection.clone();
            thread::Builder::new()
                .name(format!("plotlink-rx-{}", connection.port))
                .spawn(move || run_reader(connection, decoder, registry))
        });

        if let Err(e) = reader {
            let _ = connection.shutdown();
            return Err(ConnectionError::Io {
                reason: format!("failed to start workers for {}: {}", connection.port, e),
            }
            .into());
        }

        Ok(connection)
    }

    /// Unique identity of this connection
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The port this connection is attached to
    pub fn port(&self) -> &PortId {
        &self.port
    }

    /// Baud rate the port was opened at
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// False once the connection stopped accepting lines (closed or failed)
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// The last telemetry line accepted by the decoder
    pub fn last_line(&self) -> Option<String> {
        self.last_line.lock().clone()
    }

    /// The most recently decoded telemetry frame
    pub fn latest_telemetry(&self) -> Option<TelemetryFrame> {
        self.latest_frame.lock().clone()
    }

    /// Queue a raw line for the writer
    ///
    /// Returns once the line is queued; the write outcome is published as
    /// [`LinkEvent::CommandSent`] or [`LinkEvent::WriteFailed`].
    pub fn send(&self, line: impl Into<String>) -> Result<()> {
        let outbound = self.outbound.lock();
        match outbound.as_ref() {
            Some(tx) if self.is_open() => tx.send(line.into()).map_err(|_| self.not_open()),
            _ => Err(self.not_open()),
        }
    }

    /// Stop accepting lines, flush the queue and close the transport
    ///
    /// Lines queued before the call are still written; this returns once the
    /// writer has drained the queue and closed the port. Calling this on a
    /// closed connection is a no-op.
    pub(crate) fn shutdown(&self) -> std::result::Result<(), ConnectionError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // With the sender gone the writer exits after the last queued line.
        self.outbound.lock().take();

        let handle = self.writer.lock().take();
        let result = match handle {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("writer thread panicked"))),
            None => self.transport.lock().close(),
        };

        result.map_err(|e| ConnectionError::CloseFailed {
            port: self.port.to_string(),
            reason: e.to_string(),
        })
    }

    fn not_open(&self) -> plotlink_core::Error {
        ConnectionError::NotOpen {
            port: self.port.to_string(),
        }
        .into()
    }

    fn publish_frame(&self, frame: TelemetryFrame) {
        tracing::debug!("Telemetry from {}: {}", self.port, frame);
        *self.latest_frame.lock() = Some(frame.clone());
        self.events.publish(LinkEvent::Telemetry {
            port: self.port.clone(),
            frame,
        });
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}

fn run_writer(
    connection: Arc<Connection>,
    mut rx: mpsc::UnboundedReceiver<String>,
) -> io::Result<()> {
    while let Some(line) = rx.blocking_recv() {
        let port = connection.port.clone();
        let result = connection.transport.lock().write_all(line.as_bytes());
        match result {
            Ok(()) => {
                tracing::info!("Command sent to {}: {}", port, line.trim_end());
                connection
                    .events
                    .publish(LinkEvent::CommandSent { port, line });
            }
            Err(e) => {
                let err = ConnectionError::WriteFailed {
                    port: port.to_string(),
                    reason: e.to_string(),
                };
                tracing::error!("{}", err);
                connection.events.publish(LinkEvent::WriteFailed {
                    port,
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::trace!("Writer for {} drained, closing port", connection.port);
    connection.transport.lock().close()
}

fn run_reader(
    connection: Arc<Connection>,
    mut decoder: Box<dyn FrameDecoder>,
    registry: WeakRegistry,
) {
    let mut buf = [0u8; READ_CHUNK];

    while connection.is_open() {
        let result = connection.transport.lock().read(&mut buf);

        match result {
            Ok(0) => thread::sleep(IDLE_DELAY),
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]);
                let frames = decoder.feed(&chunk);
                *connection.last_line.lock() = decoder.last_line().map(str::to_string);

                for frame in frames {
                    connection.publish_frame(frame);
                }
            }
            Err(e) if is_idle(&e) => thread::sleep(IDLE_DELAY),
            Err(e) => {
                if !connection.is_open() {
                    break;
                }

                tracing::error!(
                    "Read from {} failed, dropping connection: {}",
                    connection.port,
                    e
                );
                connection.events.publish(LinkEvent::PortError {
                    port: connection.port.clone(),
                    reason: e.to_string(),
                });

                if let Err(close_err) = connection.shutdown() {
                    tracing::warn!("{}", close_err);
                }
                unregister(&registry, &connection);
                break;
            }
        }
    }

    tracing::trace!("Reader for {} stopped", connection.port);
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Remove `connection` from the registry if it is still the registered one
fn unregister(registry: &WeakRegistry, connection: &Arc<Connection>) {
    let Some(registry) = registry.upgrade() else {
        return;
    };

    let mut registry = registry.lock();
    if registry
        .get(&connection.port)
        .is_some_and(|registered| Arc::ptr_eq(registered, connection))
    {
        registry.remove(&connection.port);
    }
}
