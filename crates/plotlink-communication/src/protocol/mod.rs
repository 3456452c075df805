//! Line codec for the controller's ASCII protocol
//!
//! Outbound: [`MotionCommand`] encodes to one `\n`-terminated line.
//! Inbound: a [`FrameDecoder`] splits raw device output into lines and turns
//! the valid ones into [`TelemetryFrame`](plotlink_core::TelemetryFrame)s.

pub mod command;
pub mod framing;
pub mod telemetry;

pub use command::MotionCommand;
pub use framing::{decoder_for, BufferedReadDecoder, DelimiterFramedDecoder, FrameDecoder};
pub use telemetry::parse_fields;
