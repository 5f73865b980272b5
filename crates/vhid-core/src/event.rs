//! Normalized input events handed to the downstream sink.
//!
//! Every decoder, whatever its wire format, produces the same shape of event:
//! a device class, an event kind, a code and a value.  The numeric codes follow
//! the Linux input-event-codes numbering so a sink can forward them to an
//! evdev-style consumer without another translation table.
//!
//! # Frames (for beginners)
//!
//! A single physical action usually produces several events: a pointer packet
//! yields button states plus X/Y motion.  The consumer must see those events as
//! one atomic update, so each group ends with a [`EventKind::Sync`] marker.
//! Everything between two sync markers is called a *frame*.

use serde::{Deserialize, Serialize};

/// Which emulated device produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Keyboard,
    Pointer,
    Touch,
}

impl DeviceClass {
    /// Lowercase name used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Keyboard => "keyboard",
            DeviceClass::Pointer => "pointer",
            DeviceClass::Touch => "touch",
        }
    }
}

/// The kind of an event; the numeric value matches the evdev event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventKind {
    /// Frame terminator (`EV_SYN`).
    Sync = 0x00,
    /// Key or button state (`EV_KEY`); value 1 = pressed, 0 = released.
    Key = 0x01,
    /// Relative axis motion (`EV_REL`).
    RelativeAxis = 0x02,
    /// Absolute axis position (`EV_ABS`).
    AbsoluteAxis = 0x03,
}

impl EventKind {
    /// Short uppercase name, matching the labels used by evdev tooling.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Sync => "SYN",
            EventKind::Key => "KEY",
            EventKind::RelativeAxis => "REL",
            EventKind::AbsoluteAxis => "ABS",
        }
    }
}

/// One normalized event.  Immutable once emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub device: DeviceClass,
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl NormalizedEvent {
    /// A key/button state event.
    pub fn key(device: DeviceClass, code: u16, pressed: bool) -> Self {
        Self {
            device,
            kind: EventKind::Key,
            code,
            value: i32::from(pressed),
        }
    }

    /// A relative-axis event.
    pub fn relative(device: DeviceClass, axis: u16, delta: i32) -> Self {
        Self {
            device,
            kind: EventKind::RelativeAxis,
            code: axis,
            value: delta,
        }
    }

    /// An absolute-axis event.
    pub fn absolute(device: DeviceClass, axis: u16, value: i32) -> Self {
        Self {
            device,
            kind: EventKind::AbsoluteAxis,
            code: axis,
            value,
        }
    }

    /// The frame terminator.
    pub fn sync(device: DeviceClass) -> Self {
        Self {
            device,
            kind: EventKind::Sync,
            code: codes::SYN_REPORT,
            value: 0,
        }
    }

    /// Returns `true` for a frame terminator.
    pub fn is_sync(&self) -> bool {
        self.kind == EventKind::Sync
    }
}

/// Button, axis and sync codes (Linux input-event-codes numbering).
///
/// Keyboard key codes live in [`crate::keymap::KeyCode`].
pub mod codes {
    pub const SYN_REPORT: u16 = 0x00;

    pub const BTN_LEFT: u16 = 0x110;
    pub const BTN_RIGHT: u16 = 0x111;
    pub const BTN_MIDDLE: u16 = 0x112;
    pub const BTN_SIDE: u16 = 0x113;
    pub const BTN_EXTRA: u16 = 0x114;
    pub const BTN_TOOL_FINGER: u16 = 0x145;
    pub const BTN_TOUCH: u16 = 0x14A;
    pub const BTN_TOOL_DOUBLETAP: u16 = 0x14D;

    pub const REL_X: u16 = 0x00;
    pub const REL_Y: u16 = 0x01;
    pub const REL_HWHEEL: u16 = 0x06;
    pub const REL_WHEEL: u16 = 0x08;

    pub const ABS_X: u16 = 0x00;
    pub const ABS_Y: u16 = 0x01;
    pub const ABS_PRESSURE: u16 = 0x18;
    pub const ABS_MT_SLOT: u16 = 0x2F;
    pub const ABS_MT_POSITION_X: u16 = 0x35;
    pub const ABS_MT_POSITION_Y: u16 = 0x36;
    pub const ABS_MT_TRACKING_ID: u16 = 0x39;
    pub const ABS_MT_PRESSURE: u16 = 0x3A;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_constructor_maps_pressed_to_one() {
        let down = NormalizedEvent::key(DeviceClass::Keyboard, 30, true);
        let up = NormalizedEvent::key(DeviceClass::Keyboard, 30, false);

        assert_eq!(down.value, 1);
        assert_eq!(up.value, 0);
        assert_eq!(down.kind, EventKind::Key);
    }

    #[test]
    fn test_sync_marker_is_recognised() {
        let sync = NormalizedEvent::sync(DeviceClass::Pointer);

        assert!(sync.is_sync());
        assert_eq!(sync.code, codes::SYN_REPORT);
        assert!(!NormalizedEvent::relative(DeviceClass::Pointer, codes::REL_X, 4).is_sync());
    }

    #[test]
    fn test_event_kind_discriminants_match_evdev_types() {
        assert_eq!(EventKind::Sync as u16, 0);
        assert_eq!(EventKind::Key as u16, 1);
        assert_eq!(EventKind::RelativeAxis as u16, 2);
        assert_eq!(EventKind::AbsoluteAxis as u16, 3);
    }
}
