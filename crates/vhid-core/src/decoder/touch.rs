//! Touch surface translator (multi-touch protocol B).
//!
//! Touch input arrives already framed as a [`TouchCommand`], so there is no
//! byte assembly here.  Each command becomes one or two complete frames:
//!
//! - `Contact` updates slot 0 (pressure 0 lifts the finger),
//! - `Tap` emits a down frame then an up frame with `BTN_LEFT`,
//! - `TwoFingerTap` does the same on slots 0 and 1 with `BTN_RIGHT`,
//! - `Scroll` emits wheel axes only.
//!
//! The only state kept between commands is which slots hold a contact and the
//! tracking id each one was given, so a consumer can follow a finger across
//! updates.
//!
//! # Protocol B in brief (for beginners)
//!
//! A multi-touch frame addresses contacts through *slots*.  `ABS_MT_SLOT`
//! selects a slot, `ABS_MT_TRACKING_ID` says which finger occupies it
//! (-1 = the finger lifted), and the `ABS_MT_POSITION_*`/`ABS_MT_PRESSURE`
//! axes that follow apply to the selected slot.  Older consumers that only
//! understand one contact read the mirrored `ABS_X`/`ABS_Y`/`ABS_PRESSURE`
//! axes and `BTN_TOUCH` instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Decoder;
use crate::device::InjectError;
use crate::event::{codes, DeviceClass, NormalizedEvent};
use crate::sink::{CapabilitySet, EventSink};
use crate::stats::TouchStats;

/// Number of contact slots tracked.
pub const MAX_SLOTS: usize = 5;

/// Pressure reported by the tap shorthands.
pub const TAP_PRESSURE: i32 = 128;

/// Tracking id that marks a slot as empty.
const LIFTED: i32 = -1;

/// Inclusive upper bounds for positions and pressure.  Lower bounds are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchBounds {
    pub max_x: i32,
    pub max_y: i32,
    pub max_pressure: i32,
}

impl Default for TouchBounds {
    fn default() -> Self {
        Self {
            max_x: 4095,
            max_y: 4095,
            max_pressure: 255,
        }
    }
}

impl TouchBounds {
    fn check(field: &'static str, value: i32, max: i32) -> Result<(), InjectError> {
        if (0..=max).contains(&value) {
            Ok(())
        } else {
            Err(InjectError::OutOfBounds { field, value, max })
        }
    }

    fn check_point(&self, x: i32, y: i32) -> Result<(), InjectError> {
        Self::check("x", x, self.max_x)?;
        Self::check("y", y, self.max_y)
    }
}

/// A pre-framed touch stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchCommand {
    /// Position/pressure update on slot 0; `pressure == 0` lifts the finger.
    Contact { x: i32, y: i32, pressure: i32 },
    /// Complete single-finger tap.
    Tap { x: i32, y: i32 },
    /// Complete two-finger tap on slots 0 and 1.
    TwoFingerTap { x1: i32, y1: i32, x2: i32, y2: i32 },
    /// Two-finger scroll; positive `dy` scrolls down.
    Scroll { dx: i32, dy: i32 },
}

impl TouchCommand {
    /// Checks every coordinate and pressure against `bounds`.
    ///
    /// A failing command must be rejected as a whole; nothing is clamped.
    pub fn validate(&self, bounds: &TouchBounds) -> Result<(), InjectError> {
        match *self {
            TouchCommand::Contact { x, y, pressure } => {
                bounds.check_point(x, y)?;
                TouchBounds::check("pressure", pressure, bounds.max_pressure)
            }
            TouchCommand::Tap { x, y } => bounds.check_point(x, y),
            TouchCommand::TwoFingerTap { x1, y1, x2, y2 } => {
                bounds.check_point(x1, y1)?;
                bounds.check_point(x2, y2)
            }
            TouchCommand::Scroll { .. } => Ok(()),
        }
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Translates touch commands into protocol-B frames.
#[derive(Debug)]
pub struct TouchDecoder {
    /// Tracking id per slot, `None` when empty.
    slots: [Option<i32>; MAX_SLOTS],
    next_tracking_id: i32,
    stats: Arc<TouchStats>,
}

impl TouchDecoder {
    pub fn new(stats: Arc<TouchStats>) -> Self {
        Self {
            slots: [None; MAX_SLOTS],
            next_tracking_id: 0,
            stats,
        }
    }

    pub fn capabilities() -> CapabilitySet {
        CapabilitySet::new()
            .with_keys([
                codes::BTN_LEFT,
                codes::BTN_RIGHT,
                codes::BTN_TOUCH,
                codes::BTN_TOOL_FINGER,
                codes::BTN_TOOL_DOUBLETAP,
            ])
            .with_absolute([
                codes::ABS_X,
                codes::ABS_Y,
                codes::ABS_PRESSURE,
                codes::ABS_MT_SLOT,
                codes::ABS_MT_TRACKING_ID,
                codes::ABS_MT_POSITION_X,
                codes::ABS_MT_POSITION_Y,
                codes::ABS_MT_PRESSURE,
            ])
            .with_relative([codes::REL_WHEEL, codes::REL_HWHEEL])
    }

    /// Number of slots currently holding a contact.
    pub fn active_contacts(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Emits one command's frames and updates the counters.
    pub fn apply(&mut self, command: TouchCommand, sink: &mut dyn EventSink) {
        match command {
            TouchCommand::Contact { x, y, pressure } if pressure > 0 => {
                self.slot_down(sink, 0, x, y, pressure);
                mirror(sink, x, y, pressure);
                key(sink, codes::BTN_TOUCH, true);
                key(sink, codes::BTN_TOOL_FINGER, true);
                sync(sink);
                self.stats.inc_move();
                debug!(x, y, pressure, "touch contact");
            }
            TouchCommand::Contact { x, y, .. } => {
                self.slot_up(sink, 0);
                key(sink, codes::BTN_TOUCH, false);
                key(sink, codes::BTN_TOOL_FINGER, false);
                abs(sink, codes::ABS_PRESSURE, 0);
                sync(sink);
                self.stats.inc_touch();
                debug!(x, y, "touch lift");
            }
            TouchCommand::Tap { x, y } => {
                self.slot_down(sink, 0, x, y, TAP_PRESSURE);
                mirror(sink, x, y, TAP_PRESSURE);
                key(sink, codes::BTN_TOUCH, true);
                key(sink, codes::BTN_TOOL_FINGER, true);
                key(sink, codes::BTN_LEFT, true);
                sync(sink);

                self.slot_up(sink, 0);
                key(sink, codes::BTN_TOUCH, false);
                key(sink, codes::BTN_TOOL_FINGER, false);
                key(sink, codes::BTN_LEFT, false);
                abs(sink, codes::ABS_PRESSURE, 0);
                sync(sink);

                self.stats.inc_tap();
                info!(x, y, "tap");
            }
            TouchCommand::TwoFingerTap { x1, y1, x2, y2 } => {
                self.slot_down(sink, 0, x1, y1, TAP_PRESSURE);
                self.slot_down(sink, 1, x2, y2, TAP_PRESSURE);
                key(sink, codes::BTN_TOUCH, true);
                key(sink, codes::BTN_TOOL_DOUBLETAP, true);
                key(sink, codes::BTN_RIGHT, true);
                sync(sink);

                self.slot_up(sink, 0);
                self.slot_up(sink, 1);
                key(sink, codes::BTN_TOUCH, false);
                key(sink, codes::BTN_TOOL_DOUBLETAP, false);
                key(sink, codes::BTN_RIGHT, false);
                sync(sink);

                self.stats.inc_two_finger_tap();
                info!(x1, y1, x2, y2, "two-finger tap");
            }
            TouchCommand::Scroll { dx, dy } => {
                if dy != 0 {
                    // Natural scrolling: finger down moves content up.
                    rel(sink, codes::REL_WHEEL, dy.saturating_neg());
                }
                if dx != 0 {
                    rel(sink, codes::REL_HWHEEL, dx);
                }
                sync(sink);
                self.stats.inc_scroll();
                debug!(dx, dy, "touch scroll");
            }
        }
    }

    fn slot_down(&mut self, sink: &mut dyn EventSink, slot: usize, x: i32, y: i32, pressure: i32) {
        let tracking_id = match self.slots[slot] {
            Some(id) => id,
            None => {
                let id = self.next_tracking_id;
                // Tracking ids are non-negative; -1 is reserved for "lifted".
                self.next_tracking_id = self.next_tracking_id.wrapping_add(1) & i32::MAX;
                self.slots[slot] = Some(id);
                id
            }
        };
        abs(sink, codes::ABS_MT_SLOT, slot as i32);
        abs(sink, codes::ABS_MT_TRACKING_ID, tracking_id);
        abs(sink, codes::ABS_MT_POSITION_X, x);
        abs(sink, codes::ABS_MT_POSITION_Y, y);
        abs(sink, codes::ABS_MT_PRESSURE, pressure);
    }

    fn slot_up(&mut self, sink: &mut dyn EventSink, slot: usize) {
        self.slots[slot] = None;
        abs(sink, codes::ABS_MT_SLOT, slot as i32);
        abs(sink, codes::ABS_MT_TRACKING_ID, LIFTED);
    }
}

fn abs(sink: &mut dyn EventSink, axis: u16, value: i32) {
    sink.emit(NormalizedEvent::absolute(DeviceClass::Touch, axis, value));
}

fn rel(sink: &mut dyn EventSink, axis: u16, value: i32) {
    sink.emit(NormalizedEvent::relative(DeviceClass::Touch, axis, value));
}

fn key(sink: &mut dyn EventSink, code: u16, pressed: bool) {
    sink.emit(NormalizedEvent::key(DeviceClass::Touch, code, pressed));
}

fn sync(sink: &mut dyn EventSink) {
    sink.emit(NormalizedEvent::sync(DeviceClass::Touch));
}

/// Single-touch mirror axes for consumers without multi-touch support.
fn mirror(sink: &mut dyn EventSink, x: i32, y: i32, pressure: i32) {
    abs(sink, codes::ABS_X, x);
    abs(sink, codes::ABS_Y, y);
    abs(sink, codes::ABS_PRESSURE, pressure);
}

impl Decoder for TouchDecoder {
    type Unit = TouchCommand;

    fn feed(&mut self, unit: TouchCommand, sink: &mut dyn EventSink) {
        self.apply(unit, sink);
    }

    fn reset(&mut self) {
        self.slots = [None; MAX_SLOTS];
        self.next_tracking_id = 0;
    }
}
