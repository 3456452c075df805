//! Event system for the serial link
//!
//! Provides:
//! - Event types for connection lifecycle, writes, and telemetry
//! - Event dispatcher for publishing events to subscribers
//!
//! All I/O outcomes that happen off the caller's thread (write completion,
//! read failures, decoded telemetry) are surfaced here rather than returned.

use crate::constants::DEFAULT_EVENT_BUFFER;
use crate::data::{PortId, TelemetryFrame};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Link event types
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A new connection was opened
    Opened {
        /// The port that was opened.
        port: PortId,
        /// Identity of the new connection.
        connection_id: Uuid,
    },
    /// A connection could not be established
    OpenFailed {
        /// The port that failed to open.
        port: PortId,
        /// The reason reported by the driver.
        reason: String,
    },
    /// A line was written to the device
    CommandSent {
        /// The port written to.
        port: PortId,
        /// The line as written, including the trailing newline.
        line: String,
    },
    /// A line could not be written
    WriteFailed {
        /// The port written to.
        port: PortId,
        /// The line that was not written.
        line: String,
        /// The reason the write failed.
        reason: String,
    },
    /// A telemetry frame was decoded
    Telemetry {
        /// The port the frame came from.
        port: PortId,
        /// The decoded frame.
        frame: TelemetryFrame,
    },
    /// A read failed and the connection was dropped
    PortError {
        /// The affected port.
        port: PortId,
        /// The reason reported by the driver.
        reason: String,
    },
    /// A connection was closed
    Closed(PortId),
    /// Closing reported an error; the connection is dropped anyway
    CloseFailed {
        /// The affected port.
        port: PortId,
        /// The reason reported by the driver.
        reason: String,
    },
}

impl LinkEvent {
    /// The port this event relates to
    pub fn port(&self) -> &PortId {
        match self {
            LinkEvent::Opened { port, .. }
            | LinkEvent::OpenFailed { port, .. }
            | LinkEvent::CommandSent { port, .. }
            | LinkEvent::WriteFailed { port, .. }
            | LinkEvent::Telemetry { port, .. }
            | LinkEvent::PortError { port, .. }
            | LinkEvent::CloseFailed { port, .. } => port,
            LinkEvent::Closed(port) => port,
        }
    }

    /// True for events that report a failure
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            LinkEvent::OpenFailed { .. }
                | LinkEvent::WriteFailed { .. }
                | LinkEvent::PortError { .. }
                | LinkEvent::CloseFailed { .. }
        )
    }
}

impl std::fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkEvent::Opened { port, .. } => write!(f, "Opened {}", port),
            LinkEvent::OpenFailed { port, reason } => {
                write!(f, "Failed to open {}: {}", port, reason)
            }
            LinkEvent::CommandSent { port, line } => {
                write!(f, "Sent to {}: {}", port, line.trim_end())
            }
            LinkEvent::WriteFailed { port, line, reason } => {
                write!(f, "Write to {} failed ({}): {}", port, line.trim_end(), reason)
            }
            LinkEvent::Telemetry { port, frame } => write!(f, "Telemetry from {}: {}", port, frame),
            LinkEvent::PortError { port, reason } => write!(f, "Error on {}: {}", port, reason),
            LinkEvent::Closed(port) => write!(f, "Closed {}", port),
            LinkEvent::CloseFailed { port, reason } => {
                write!(f, "Error closing {}: {}", port, reason)
            }
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for link events.
    tx: broadcast::Sender<LinkEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Having no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: LinkEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            tracing::trace!("No subscribers for link event: {}", event);
        }
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        dispatcher.publish(LinkEvent::Closed(PortId::from("COM1")));
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_receives_events() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        dispatcher.publish(LinkEvent::CommandSent {
            port: PortId::from("COM1"),
            line: "M0\n".to_string(),
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.port().as_str(), "COM1");
        assert!(!event.is_error());
        assert_eq!(event.to_string(), "Sent to COM1: M0");
    }

    #[test]
    fn test_error_events() {
        let event = LinkEvent::WriteFailed {
            port: PortId::from("COM1"),
            line: "M0\n".to_string(),
            reason: "broken pipe".to_string(),
        };
        assert!(event.is_error());
        assert!(!LinkEvent::Closed(PortId::from("COM1")).is_error());
    }
}
