//! Recorded stimulus streams and deterministic replay.
//!
//! A [`Recording`] is the ordered list of stimuli that were injected into the
//! three devices, interleaved with the configuration writes, lock-indicator
//! writes and resets that happened between them.  It is stored in a compact binary form with `bincode`.
//! Replaying it into freshly constructed (or reinitialised) devices feeds
//! the same units through the same decoders, so the emitted events and the
//! final counters come out identical.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, SettingChange};
use crate::decoder::{Lock, TouchCommand};
use crate::device::{InjectError, KeyboardDevice, PointerDevice, TouchDevice};
use crate::event::DeviceClass;
use crate::sink::EventSink;

/// Error from encoding or decoding a recording.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("failed to encode recording: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode recording: {0}")]
    Decode(#[source] bincode::Error),
}

/// One injected stimulus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stimulus {
    /// A keyboard scan-code byte.
    Keyboard(u8),
    /// A whole pointer packet (3 or 4 bytes).
    PointerPacket(Vec<u8>),
    /// A single raw pointer byte.
    PointerByte(u8),
    /// A touch command.
    Touch(TouchCommand),
    /// A configuration write.
    Setting(SettingChange),
    /// A keyboard lock-indicator write.
    Lock(Lock, bool),
    /// A reinitialisation of one device, or of all three when `None`.
    Reset(Option<DeviceClass>),
}

/// Why a replayed stimulus was refused.
enum Refused {
    Inject(InjectError),
    Config(ConfigError),
}

/// An ordered stimulus stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub stimuli: Vec<Stimulus>,
}

/// Outcome counts from a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub accepted: usize,
    pub dropped: usize,
    pub rejected: usize,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stimulus: Stimulus) {
        self.stimuli.push(stimulus);
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordingError> {
        bincode::serialize(self).map_err(RecordingError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordingError> {
        bincode::deserialize(bytes).map_err(RecordingError::Decode)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), RecordingError> {
        bincode::serialize_into(writer, self).map_err(RecordingError::Encode)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, RecordingError> {
        bincode::deserialize_from(reader).map_err(RecordingError::Decode)
    }

    /// Injects every stimulus in order, draining the target device after each.
    ///
    /// Settings are written to the pointer's configuration store, which the
    /// composition root shares with the keyboard.
    pub fn replay<K, P, T>(
        &self,
        keyboard: &KeyboardDevice<K>,
        pointer: &PointerDevice<P>,
        touch: &TouchDevice<T>,
    ) -> ReplaySummary
    where
        K: EventSink,
        P: EventSink,
        T: EventSink,
    {
        let mut summary = ReplaySummary::default();
        for stimulus in &self.stimuli {
            let outcome: Result<bool, Refused> = match stimulus {
                Stimulus::Keyboard(byte) => {
                    let ok = keyboard.inject_scancode(*byte);
                    keyboard.run_deferred();
                    Ok(ok)
                }
                Stimulus::PointerPacket(bytes) => {
                    let result = pointer.inject_packet(bytes).map_err(Refused::Inject);
                    pointer.run_deferred();
                    result
                }
                Stimulus::PointerByte(byte) => {
                    let ok = pointer.inject_byte(*byte);
                    pointer.run_deferred();
                    Ok(ok)
                }
                Stimulus::Touch(command) => {
                    let result = touch.inject(*command).map_err(Refused::Inject);
                    touch.run_deferred();
                    result
                }
                Stimulus::Setting(change) => pointer
                    .config()
                    .apply(*change)
                    .map(|()| true)
                    .map_err(Refused::Config),
                Stimulus::Lock(lock, on) => {
                    keyboard.set_lock(*lock, *on);
                    Ok(true)
                }
                Stimulus::Reset(device) => {
                    if matches!(device, None | Some(DeviceClass::Keyboard)) {
                        keyboard.reinitialize();
                    }
                    if matches!(device, None | Some(DeviceClass::Pointer)) {
                        pointer.reinitialize();
                    }
                    if matches!(device, None | Some(DeviceClass::Touch)) {
                        touch.reinitialize();
                    }
                    Ok(true)
                }
            };
            match outcome {
                Ok(true) => summary.accepted += 1,
                Ok(false) => summary.dropped += 1,
                Err(Refused::Inject(e)) => {
                    debug!(%e, "replayed stimulus rejected");
                    summary.rejected += 1;
                }
                Err(Refused::Config(e)) => {
                    debug!(%e, "replayed setting rejected");
                    summary.rejected += 1;
                }
            }
        }
        debug!(
            accepted = summary.accepted,
            dropped = summary.dropped,
            rejected = summary.rejected,
            "recording replayed"
        );
        summary
    }
}
