//! # vhid-core
//!
//! Decode-and-buffer pipeline for emulated human-interface devices: a
//! keyboard fed scan codes, a PS/2-style pointer fed packet bytes, and a
//! multi-touch surface fed structured commands.
//!
//! This crate has no dependencies on OS APIs, async runtimes or I/O.  The
//! daemon crate wires it to command sources and event logs.
//!
//! # Architecture overview (for beginners)
//!
//! Every device is split into a producer half and a consumer half joined by
//! a bounded queue:
//!
//! ```text
//!  inject_*()  ──►  IngressQueue  ──►  DeferredProcessor  ──►  Decoder  ──►  EventSink
//!  (producer)       (bounded FIFO)     (drains to empty)      (state)       (downstream)
//! ```
//!
//! - **`queue`** – The bounded FIFO.  Pushing never blocks; a full queue drops
//!   the unit and the caller counts an overflow.
//!
//! - **`processor`** – Drains the queue through a decoder.  Only one drain
//!   runs per device at a time; overlapping activations coalesce.
//!
//! - **`decoder`** – The three state machines.  The keyboard decoder tracks
//!   modifiers and locks, the pointer decoder assembles 3- or 4-byte packets,
//!   the touch decoder expands commands into multi-touch frames.
//!
//! - **`event`** – The normalized event every decoder emits, plus the event
//!   code constants.
//!
//! - **`sink`** – The downstream [`EventSink`] trait and the capability guard
//!   that keeps each device inside the codes it declared.
//!
//! - **`config`** / **`stats`** – Lock-free tunables and counters shared with
//!   the outside world without ever waiting on a decoder.
//!
//! - **`device`** – The three devices assembled from the pieces above.
//!
//! - **`recording`** – A serialisable stimulus stream that can be replayed
//!   into fresh devices to reproduce the same events.

pub mod config;
pub mod decoder;
pub mod device;
pub mod event;
pub mod keymap;
pub mod processor;
pub mod queue;
pub mod recording;
pub mod sink;
pub mod stats;

// Re-export the most-used types at the crate root so callers can write
// `vhid_core::KeyboardDevice` instead of `vhid_core::device::keyboard::KeyboardDevice`.
pub use config::{ConfigError, ConfigurationStore, DeviceSettings, PacketFraming, SettingChange};
pub use decoder::{Decoder, Lock, TouchBounds, TouchCommand};
pub use device::{InjectError, KeyboardDevice, PointerDevice, TouchDevice};
pub use event::{codes, DeviceClass, EventKind, NormalizedEvent};
pub use keymap::KeyCode;
pub use queue::IngressQueue;
pub use recording::{Recording, RecordingError, ReplaySummary, Stimulus};
pub use sink::{CapabilitySet, EventSink};
pub use stats::{StatisticsRegistry, StatisticsSnapshot};
