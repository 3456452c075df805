//! Motion command encoding
//!
//! The controller understands a small G-code dialect, one command per
//! `\n`-terminated ASCII line:
//!
//! | Command          | Line              |
//! |------------------|-------------------|
//! | move             | `G0 X{x} Y{y}`    |
//! | set position     | `G92 X{x} Y{y}`   |
//! | stop             | `M0`              |
//! | motor power      | `M98 R{level}`    |
//! | step interval    | `M99 R{interval}` |

use plotlink_core::constants::{DEFAULT_POWER_LEVEL, DEFAULT_SPEED_INTERVAL};
use plotlink_core::CommandError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One instruction for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionCommand {
    /// Rapid move to an absolute position
    Move {
        /// Target X
        x: i32,
        /// Target Y
        y: i32,
    },
    /// Declare the current position to be (x, y)
    SetZero {
        /// New X of the current position
        x: i32,
        /// New Y of the current position
        y: i32,
    },
    /// Halt motion
    Stop,
    /// Motor power level (1-4)
    SetPower(u8),
    /// Step interval; smaller is faster
    SetSpeed(u32),
}

impl MotionCommand {
    /// Move to (x, y)
    pub fn move_to(x: i32, y: i32) -> Self {
        Self::Move { x, y }
    }

    /// Redefine the current position as (x, y)
    pub fn set_zero(x: i32, y: i32) -> Self {
        Self::SetZero { x, y }
    }

    /// Set motor power, defaulting to level 1
    pub fn set_power(level: Option<u8>) -> Self {
        Self::SetPower(level.unwrap_or(DEFAULT_POWER_LEVEL))
    }

    /// Set step interval, defaulting to 600
    pub fn set_speed(interval: Option<u32>) -> Self {
        Self::SetSpeed(interval.unwrap_or(DEFAULT_SPEED_INTERVAL))
    }

    /// The G/M word that starts the line
    pub fn code(&self) -> &'static str {
        match self {
            Self::Move { .. } => "G0",
            Self::SetZero { .. } => "G92",
            Self::Stop => "M0",
            Self::SetPower(_) => "M98",
            Self::SetSpeed(_) => "M99",
        }
    }

    /// Encode as a wire line, including the trailing newline
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }

    /// Parse a command line as the controller would receive it
    ///
    /// Missing X/Y words default to 0 and a missing R word to the command's
    /// default, mirroring how the commands are built.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let code = words
            .next()
            .ok_or_else(|| parse_error(line, "empty line"))?
            .to_ascii_uppercase();

        let mut x = None;
        let mut y = None;
        let mut r = None;

        for word in words {
            let mut chars = word.chars();
            let letter = chars
                .next()
                .map(|c| c.to_ascii_uppercase())
                .ok_or_else(|| parse_error(line, "empty word"))?;
            let value = chars.as_str();

            match letter {
                'X' => x = Some(parse_number::<i32>(line, letter, value)?),
                'Y' => y = Some(parse_number::<i32>(line, letter, value)?),
                'R' => r = Some(parse_number::<u32>(line, letter, value)?),
                other => return Err(parse_error(line, &format!("unexpected word '{}'", other))),
            }
        }

        let positional = |cmd: fn(i32, i32) -> Self| -> Result<Self, CommandError> {
            if r.is_some() {
                return Err(parse_error(line, "R word not allowed"));
            }
            Ok(cmd(x.unwrap_or(0), y.unwrap_or(0)))
        };

        match code.as_str() {
            "G0" => positional(Self::move_to),
            "G92" => positional(Self::set_zero),
            "M0" if x.is_none() && y.is_none() && r.is_none() => Ok(Self::Stop),
            "M98" if x.is_none() && y.is_none() => {
                let level = match r {
                    Some(r) => u8::try_from(r)
                        .map_err(|_| parse_error(line, "power level does not fit in u8"))?,
                    None => DEFAULT_POWER_LEVEL,
                };
                Ok(Self::SetPower(level))
            }
            "M99" if x.is_none() && y.is_none() => Ok(Self::set_speed(r)),
            "M0" | "M98" | "M99" => Err(parse_error(line, "unexpected axis word")),
            other => Err(parse_error(line, &format!("unknown command '{}'", other))),
        }
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move { x, y } | Self::SetZero { x, y } => {
                write!(f, "{} X{} Y{}", self.code(), x, y)
            }
            Self::Stop => f.write_str(self.code()),
            Self::SetPower(level) => write!(f, "{} R{}", self.code(), level),
            Self::SetSpeed(interval) => write!(f, "{} R{}", self.code(), interval),
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    line: &str,
    letter: char,
    value: &str,
) -> Result<T, CommandError> {
    value
        .parse::<T>()
        .map_err(|_| parse_error(line, &format!("bad {} value '{}'", letter, value)))
}

fn parse_error(line: &str, reason: &str) -> CommandError {
    CommandError::Parse {
        line: line.trim_end().to_string(),
        reason: reason.to_string(),
    }
}
