//! Runtime tunables shared between the configuration surface and the decoders.
//!
//! Every field lives in its own atomic so a configuration read or write never
//! waits on an in-flight decode cycle, and a decode never waits on a write.
//! Writes are range-checked at the boundary: an out-of-range value is rejected
//! with [`ConfigError::OutOfRange`] and the previous value is kept.
//!
//! A successful write is visible to the next decode cycle.  For packet framing
//! that means the next *packet boundary*: a partially assembled packet keeps
//! the length it started with.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyboard repeat delay bounds and default, in milliseconds.
pub const REPEAT_DELAY_RANGE: (u32, u32) = (50, 2000);
pub const DEFAULT_REPEAT_DELAY_MS: u32 = 250;

/// Keyboard repeat period bounds and default, in milliseconds.
pub const REPEAT_RATE_RANGE: (u32, u32) = (10, 500);
pub const DEFAULT_REPEAT_RATE_MS: u32 = 33;

/// Pointer displacement scaling bounds and default, in percent.
pub const DPI_RANGE: (u32, u32) = (10, 1000);
pub const DEFAULT_DPI_PERCENT: u32 = 100;

/// Error returned by a rejected configuration write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside the accepted range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

fn check_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<u32, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

// ── Packet framing ────────────────────────────────────────────────────────────

/// Pointer packet length convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketFraming {
    /// Classic 3-byte PS/2 packet: buttons, X, Y.
    Standard,
    /// 4-byte IntelliMouse packet: adds a scroll nibble and two extra buttons.
    #[default]
    IntelliMouse,
}

impl PacketFraming {
    /// Number of bytes in one packet.
    pub fn packet_len(self) -> usize {
        match self {
            PacketFraming::Standard => 3,
            PacketFraming::IntelliMouse => 4,
        }
    }

    /// Maps a packet length back to its framing.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            3 => Some(PacketFraming::Standard),
            4 => Some(PacketFraming::IntelliMouse),
            _ => None,
        }
    }

    fn to_raw(self) -> u8 {
        self.packet_len() as u8
    }

    fn from_raw(raw: u8) -> Self {
        if raw == 3 {
            PacketFraming::Standard
        } else {
            PacketFraming::IntelliMouse
        }
    }
}

// ── Serialisable settings ─────────────────────────────────────────────────────

/// Plain-data form of [`ConfigurationStore`], used for persistence and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_repeat_delay")]
    pub repeat_delay_ms: u32,
    #[serde(default = "default_repeat_rate")]
    pub repeat_rate_ms: u32,
    #[serde(default = "default_dpi")]
    pub dpi_percent: u32,
    #[serde(default)]
    pub packet_framing: PacketFraming,
}

fn default_repeat_delay() -> u32 {
    DEFAULT_REPEAT_DELAY_MS
}
fn default_repeat_rate() -> u32 {
    DEFAULT_REPEAT_RATE_MS
}
fn default_dpi() -> u32 {
    DEFAULT_DPI_PERCENT
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            repeat_delay_ms: DEFAULT_REPEAT_DELAY_MS,
            repeat_rate_ms: DEFAULT_REPEAT_RATE_MS,
            dpi_percent: DEFAULT_DPI_PERCENT,
            packet_framing: PacketFraming::default(),
        }
    }
}

impl DeviceSettings {
    /// Checks every field against its range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("repeat_delay_ms", self.repeat_delay_ms, REPEAT_DELAY_RANGE)?;
        check_range("repeat_rate_ms", self.repeat_rate_ms, REPEAT_RATE_RANGE)?;
        check_range("dpi_percent", self.dpi_percent, DPI_RANGE)?;
        Ok(())
    }
}

/// One write to a [`ConfigurationStore`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingChange {
    RepeatDelayMs(u32),
    RepeatRateMs(u32),
    DpiPercent(u32),
    Framing(PacketFraming),
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Lock-free process-wide tunables.
#[derive(Debug)]
pub struct ConfigurationStore {
    repeat_delay_ms: AtomicU32,
    repeat_rate_ms: AtomicU32,
    dpi_percent: AtomicU32,
    packet_framing: AtomicU8,
}

impl Default for ConfigurationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationStore {
    /// A store holding the default settings.
    pub fn new() -> Self {
        let defaults = DeviceSettings::default();
        Self {
            repeat_delay_ms: AtomicU32::new(defaults.repeat_delay_ms),
            repeat_rate_ms: AtomicU32::new(defaults.repeat_rate_ms),
            dpi_percent: AtomicU32::new(defaults.dpi_percent),
            packet_framing: AtomicU8::new(defaults.packet_framing.to_raw()),
        }
    }

    /// Builds a store from persisted settings, validating every field.
    pub fn from_settings(settings: &DeviceSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            repeat_delay_ms: AtomicU32::new(settings.repeat_delay_ms),
            repeat_rate_ms: AtomicU32::new(settings.repeat_rate_ms),
            dpi_percent: AtomicU32::new(settings.dpi_percent),
            packet_framing: AtomicU8::new(settings.packet_framing.to_raw()),
        })
    }

    /// Current values as plain data.
    pub fn snapshot(&self) -> DeviceSettings {
        DeviceSettings {
            repeat_delay_ms: self.repeat_delay_ms(),
            repeat_rate_ms: self.repeat_rate_ms(),
            dpi_percent: self.dpi_percent(),
            packet_framing: self.packet_framing(),
        }
    }

    pub fn repeat_delay_ms(&self) -> u32 {
        self.repeat_delay_ms.load(Ordering::Acquire)
    }

    pub fn repeat_rate_ms(&self) -> u32 {
        self.repeat_rate_ms.load(Ordering::Acquire)
    }

    pub fn dpi_percent(&self) -> u32 {
        self.dpi_percent.load(Ordering::Acquire)
    }

    pub fn packet_framing(&self) -> PacketFraming {
        PacketFraming::from_raw(self.packet_framing.load(Ordering::Acquire))
    }

    /// Sets the repeat delay; rejects values outside 50–2000 ms.
    pub fn set_repeat_delay_ms(&self, value: u32) -> Result<(), ConfigError> {
        let value = check_range("repeat_delay_ms", value, REPEAT_DELAY_RANGE)?;
        self.repeat_delay_ms.store(value, Ordering::Release);
        Ok(())
    }

    /// Sets the repeat period; rejects values outside 10–500 ms.
    pub fn set_repeat_rate_ms(&self, value: u32) -> Result<(), ConfigError> {
        let value = check_range("repeat_rate_ms", value, REPEAT_RATE_RANGE)?;
        self.repeat_rate_ms.store(value, Ordering::Release);
        Ok(())
    }

    /// Sets the displacement scale; rejects values outside 10–1000 %.
    pub fn set_dpi_percent(&self, value: u32) -> Result<(), ConfigError> {
        let value = check_range("dpi_percent", value, DPI_RANGE)?;
        self.dpi_percent.store(value, Ordering::Release);
        Ok(())
    }

    /// Applies one field write with the same validation as the setters.
    pub fn apply(&self, change: SettingChange) -> Result<(), ConfigError> {
        match change {
            SettingChange::RepeatDelayMs(value) => self.set_repeat_delay_ms(value),
            SettingChange::RepeatRateMs(value) => self.set_repeat_rate_ms(value),
            SettingChange::DpiPercent(value) => self.set_dpi_percent(value),
            SettingChange::Framing(framing) => {
                self.set_packet_framing(framing);
                Ok(())
            }
        }
    }

    /// Switches packet framing.  Takes effect at the next packet boundary.
    pub fn set_packet_framing(&self, framing: PacketFraming) {
        self.packet_framing
            .store(framing.to_raw(), Ordering::Release);
    }
}
