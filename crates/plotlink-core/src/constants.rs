//! Fixed protocol constants for the plotter controller.

/// Baud rate the controller firmware is built for.
pub const DEFAULT_BAUD_RATE: u32 = 112_000;

/// Largest X coordinate (in motor steps) the machine can reach.
pub const X_MAX: i32 = 55_000;

/// Largest Y coordinate (in motor steps) the machine can reach.
pub const Y_MAX: i32 = 21_000;

/// Lowest accepted `M98` power level.
pub const MIN_POWER_LEVEL: u8 = 1;

/// Highest accepted `M98` power level.
pub const MAX_POWER_LEVEL: u8 = 4;

/// Power level used when none is given.
pub const DEFAULT_POWER_LEVEL: u8 = 1;

/// Step interval used when none is given. Smaller is faster.
pub const DEFAULT_SPEED_INTERVAL: u32 = 600;

/// Sentinel the firmware emits between telemetry lines.
pub const FRAME_DELIMITER: char = '!';

/// A telemetry line must carry at least this many fields to be published.
pub const MIN_FRAME_FIELDS: usize = 2;

/// Undelimited input beyond this many bytes is discarded.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 4096;

/// Capacity of the link event broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 100;
