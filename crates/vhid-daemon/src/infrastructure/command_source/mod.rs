//! Line-oriented command surface.
//!
//! Each non-empty line is one command; `#` starts a comment.  Numbers are
//! decimal or `0x`-prefixed hex, with an optional leading `-` where negative
//! values make sense.
//!
//! ```text
//! key 0x1e 0x9e            # scan codes, in order
//! packet 0x09 10 -3 0      # one whole pointer packet (3 or 4 bytes)
//! bytes 0x08 1 2           # raw pointer bytes, framed by the device
//! touch 100 200 80         # contact on slot 0; pressure 0 lifts
//! tap 100 200
//! tap2 100 200 300 200
//! scroll 0 -2
//! set dpi 150              # repeat_delay | repeat_rate | dpi | framing
//! set caps 1               # caps | num | scroll lock indicators, 0 or 1
//! get framing
//! stats
//! reset keyboard           # keyboard | pointer | touch, or nothing for all
//! ```
//!
//! Pointer bytes may be written as signed values (`-3` is `0xFD`), since the
//! displacement bytes are two's-complement.

pub mod reader;

use async_trait::async_trait;
use thiserror::Error;
use vhid_core::{DeviceClass, TouchCommand};

use crate::application::inject::{Command, Setting};

pub use reader::LineCommandSource;

/// Error type for reading and parsing commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("`{command}` expects {expected} argument(s), got {got}")]
    Arity {
        command: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("{value} does not fit in {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("unknown setting `{0}`")]
    UnknownSetting(String),

    #[error("unknown device `{0}`")]
    UnknownDevice(String),

    /// Reading the underlying input failed.  Ends the stream.
    #[error("I/O error reading commands: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Whether the source can keep producing commands after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Io(_))
    }
}

/// A stream of parsed commands.
#[async_trait]
pub trait CommandSource: Send {
    /// Returns the next command, or `Ok(None)` at end of input.
    ///
    /// A malformed line yields a non-fatal error; the next call continues
    /// with the following line.
    async fn next_command(&mut self) -> Result<Option<Command>, CommandError>;

    /// 1-based number of the line last read.
    fn line_number(&self) -> usize;
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parses one line.  Blank lines and comments yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.split('#').next().unwrap_or_default().trim();
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = tokens.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "key" => Command::Key(bytes("key", &args)?),
        "packet" => Command::Packet(bytes("packet", &args)?),
        "bytes" => Command::PointerBytes(bytes("bytes", &args)?),
        "touch" => {
            let [x, y, pressure] = ints::<3>("touch", &args)?;
            Command::Touch(TouchCommand::Contact { x, y, pressure })
        }
        "tap" => {
            let [x, y] = ints::<2>("tap", &args)?;
            Command::Touch(TouchCommand::Tap { x, y })
        }
        "tap2" => {
            let [x1, y1, x2, y2] = ints::<4>("tap2", &args)?;
            Command::Touch(TouchCommand::TwoFingerTap { x1, y1, x2, y2 })
        }
        "scroll" => {
            let [dx, dy] = ints::<2>("scroll", &args)?;
            Command::Touch(TouchCommand::Scroll { dx, dy })
        }
        "set" => {
            let [name, value] = exact::<2>("set", &args)?;
            let value = parse_number(value)?;
            let value = u32::try_from(value).map_err(|_| CommandError::OutOfRange {
                value,
                target: "u32",
            })?;
            Command::Set(setting(name)?, value)
        }
        "get" => {
            let [name] = exact::<1>("get", &args)?;
            Command::Get(setting(name)?)
        }
        "stats" => {
            exact::<0>("stats", &args)?;
            Command::Stats
        }
        "reset" => match args.as_slice() {
            [] => Command::Reset(None),
            [name] => Command::Reset(Some(device(name)?)),
            _ => {
                return Err(CommandError::Arity {
                    command: "reset",
                    expected: "0 or 1",
                    got: args.len(),
                })
            }
        },
        _ => return Err(CommandError::UnknownCommand(verb.to_string())),
    };
    Ok(Some(command))
}

/// Parses a decimal or `0x` hex integer with an optional sign.
pub fn parse_number(token: &str) -> Result<i64, CommandError> {
    let invalid = || CommandError::InvalidNumber(token.to_string());
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let hex = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"));
    // The standard parsers accept their own sign; only the leading `-` is ours.
    let unsigned = hex.unwrap_or(digits);
    if unsigned.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let magnitude = match hex {
        Some(hex) => i64::from_str_radix(hex, 16).map_err(|_| invalid())?,
        None => digits.parse::<i64>().map_err(|_| invalid())?,
    };
    Ok(if negative { -magnitude } else { magnitude })
}

fn exact<'a, const N: usize>(
    command: &'static str,
    args: &[&'a str],
) -> Result<[&'a str; N], CommandError> {
    <[&str; N]>::try_from(args).map_err(|_| CommandError::Arity {
        command,
        expected: ARITY_LABELS[N],
        got: args.len(),
    })
}

const ARITY_LABELS: [&str; 5] = ["0", "1", "2", "3", "4"];

fn ints<const N: usize>(command: &'static str, args: &[&str]) -> Result<[i32; N], CommandError> {
    let tokens = exact::<N>(command, args)?;
    let mut out = [0i32; N];
    for (slot, token) in out.iter_mut().zip(tokens) {
        let value = parse_number(token)?;
        *slot = i32::try_from(value).map_err(|_| CommandError::OutOfRange {
            value,
            target: "i32",
        })?;
    }
    Ok(out)
}

/// Parses byte arguments.  Accepts 0..=255 and, for two's-complement
/// displacement bytes, -128..=-1.
fn bytes(command: &'static str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
    if args.is_empty() {
        return Err(CommandError::Arity {
            command,
            expected: "1 or more",
            got: 0,
        });
    }
    args.iter()
        .map(|token| {
            let value = parse_number(token)?;
            match value {
                0..=255 => Ok(value as u8),
                -128..=-1 => Ok(value as i8 as u8),
                _ => Err(CommandError::OutOfRange {
                    value,
                    target: "a byte",
                }),
            }
        })
        .collect()
}

fn setting(name: &str) -> Result<Setting, CommandError> {
    match name.to_ascii_lowercase().as_str() {
        "repeat_delay" => Ok(Setting::RepeatDelay),
        "repeat_rate" => Ok(Setting::RepeatRate),
        "dpi" => Ok(Setting::Dpi),
        "framing" => Ok(Setting::Framing),
        "caps" => Ok(Setting::CapsLock),
        "num" => Ok(Setting::NumLock),
        "scroll" => Ok(Setting::ScrollLock),
        _ => Err(CommandError::UnknownSetting(name.to_string())),
    }
}

fn device(name: &str) -> Result<DeviceClass, CommandError> {
    match name.to_ascii_lowercase().as_str() {
        "keyboard" => Ok(DeviceClass::Keyboard),
        "pointer" => Ok(DeviceClass::Pointer),
        "touch" => Ok(DeviceClass::Touch),
        _ => Err(CommandError::UnknownDevice(name.to_string())),
    }
}
