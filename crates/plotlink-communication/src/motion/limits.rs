//! Command validation against the machine envelope

use crate::protocol::MotionCommand;
use plotlink_core::constants::{MAX_POWER_LEVEL, MIN_POWER_LEVEL};
use plotlink_core::CommandError;
use plotlink_settings::{BoundsPolicy, MachineSettings};

/// Check `command` against the machine limits
///
/// Returns the command to send, which differs from the input only when
/// coordinates were clamped.
pub fn validate(
    command: MotionCommand,
    machine: &MachineSettings,
) -> Result<MotionCommand, CommandError> {
    match command {
        MotionCommand::Move { x, y } => {
            let (x, y) = check_position(x, y, machine)?;
            Ok(MotionCommand::Move { x, y })
        }
        MotionCommand::SetZero { x, y } => {
            let (x, y) = check_position(x, y, machine)?;
            Ok(MotionCommand::SetZero { x, y })
        }
        MotionCommand::SetPower(level) if !(MIN_POWER_LEVEL..=MAX_POWER_LEVEL).contains(&level) => {
            Err(CommandError::InvalidPower {
                level,
                min: MIN_POWER_LEVEL,
                max: MAX_POWER_LEVEL,
            })
        }
        MotionCommand::SetSpeed(0) => Err(CommandError::InvalidSpeed),
        other => Ok(other),
    }
}

fn check_position(x: i32, y: i32, machine: &MachineSettings) -> Result<(i32, i32), CommandError> {
    Ok((
        check_axis('X', x, machine.x_max, machine.bounds_policy)?,
        check_axis('Y', y, machine.y_max, machine.bounds_policy)?,
    ))
}

fn check_axis(axis: char, value: i32, max: i32, policy: BoundsPolicy) -> Result<i32, CommandError> {
    if (0..=max).contains(&value) {
        return Ok(value);
    }

    match policy {
        BoundsPolicy::Reject => Err(CommandError::OutOfRange { axis, value, max }),
        BoundsPolicy::Clamp => {
            let clamped = value.clamp(0, max);
            tracing::debug!("Clamped {} from {} to {}", axis, value, clamped);
            Ok(clamped)
        }
        BoundsPolicy::Unchecked => Ok(value),
    }
}
