//! Per-device stateful decoders.
//!
//! A decoder consumes one queued unit at a time and writes whatever complete
//! events that unit produces into an [`EventSink`].  Decoder state (modifier
//! flags, the packet assembly buffer, touch tracking ids) belongs to the
//! consumer side only: the [`crate::processor::DeferredProcessor`] owns the
//! decoder and is the only caller of [`Decoder::feed`].

pub mod keyboard;
pub mod pointer;
pub mod touch;

use crate::sink::EventSink;

pub use keyboard::{Combo, KeycodeDecoder, Lock};
pub use pointer::{PacketDecoder, PointerUnit};
pub use touch::{TouchBounds, TouchCommand, TouchDecoder};

/// A consumer-side state machine driven one queued unit at a time.
pub trait Decoder: Send {
    /// The raw unit type carried by the device's ingress queue.
    type Unit: Send;

    /// Advances the state machine by one unit, emitting any complete frame.
    fn feed(&mut self, unit: Self::Unit, sink: &mut dyn EventSink);

    /// Returns to the freshly constructed state.
    fn reset(&mut self);
}
