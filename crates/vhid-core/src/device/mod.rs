//! Emulated devices: queue, deferred processor, decoder and counters wired
//! together behind an injection API.
//!
//! Every device follows the same shape:
//!
//! - `inject_*` is the producer path.  It validates the stimulus, pushes it
//!   onto the ingress queue and returns immediately.  A full queue drops the
//!   stimulus, bumps the overflow counter and returns `false`.
//! - [`run_deferred`](keyboard::KeyboardDevice::run_deferred) is the consumer
//!   path.  It drains the queue through the decoder into the sink.  The
//!   composition root calls it from a worker task after each injection, or a
//!   test calls it directly.
//! - `reinitialize` drops queued input and resets decoder state, counters and
//!   uptime, as a fresh device would start.

pub mod keyboard;
pub mod pointer;
pub mod touch;

use thiserror::Error;

pub use keyboard::KeyboardDevice;
pub use pointer::PointerDevice;
pub use touch::TouchDevice;

/// Error returned when a stimulus is rejected before it reaches the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    /// A touch coordinate or pressure is outside the configured bounds.
    #[error("{field} = {value} is outside 0..={max}")]
    OutOfBounds {
        field: &'static str,
        value: i32,
        max: i32,
    },

    /// A pointer packet that is neither 3 nor 4 bytes long.
    #[error("expected a 3 or 4 byte packet, got {0} bytes")]
    PacketLength(usize),
}
