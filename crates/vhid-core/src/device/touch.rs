//! Emulated multi-touch surface.

use std::sync::Arc;

use tracing::warn;

use super::InjectError;
use crate::decoder::{TouchBounds, TouchCommand, TouchDecoder};
use crate::event::DeviceClass;
use crate::processor::{DeferredProcessor, Worker};
use crate::queue::{IngressQueue, TOUCH_QUEUE_CAPACITY};
use crate::sink::{CapabilityGuard, EventSink};
use crate::stats::TouchStats;

/// A touch surface fed pre-framed [`TouchCommand`]s.
#[derive(Debug)]
pub struct TouchDevice<S: EventSink> {
    processor: DeferredProcessor<TouchDecoder, CapabilityGuard<S>>,
    bounds: TouchBounds,
    stats: Arc<TouchStats>,
}

impl<S: EventSink> TouchDevice<S> {
    /// Builds a device whose bounds are fixed for its lifetime.
    pub fn new(bounds: TouchBounds, sink: S) -> Self {
        Self::with_capacity(bounds, sink, TOUCH_QUEUE_CAPACITY)
    }

    pub fn with_capacity(bounds: TouchBounds, sink: S, capacity: usize) -> Self {
        let stats = Arc::new(TouchStats::default());
        let decoder = TouchDecoder::new(Arc::clone(&stats));
        let guard = CapabilityGuard::new(DeviceClass::Touch, TouchDecoder::capabilities(), sink);
        Self {
            processor: DeferredProcessor::new(Arc::new(IngressQueue::new(capacity)), decoder, guard),
            bounds,
            stats,
        }
    }

    /// Validates and queues one command.
    ///
    /// Out-of-bounds commands are counted as rejections and returned as
    /// errors; nothing reaches the queue.  `Ok(false)` means the queue was full.
    pub fn inject(&self, command: TouchCommand) -> Result<bool, InjectError> {
        if let Err(err) = command.validate(&self.bounds) {
            self.stats.inc_rejected();
            warn!(?command, %err, "touch command rejected");
            return Err(err);
        }

        if self.processor.queue().push(command) {
            Ok(true)
        } else {
            self.stats.inc_overflow();
            warn!(?command, "touch queue full, command dropped");
            Ok(false)
        }
    }

    /// Drains queued commands into the sink.
    pub fn run_deferred(&self) -> usize {
        self.processor.activate()
    }

    pub fn bounds(&self) -> TouchBounds {
        self.bounds
    }

    /// Drains the queue, waiting for a running drain to finish first.
    pub fn flush(&self) -> usize {
        self.processor.flush()
    }

    pub fn stats(&self) -> &Arc<TouchStats> {
        &self.stats
    }

    pub fn queued(&self) -> usize {
        self.processor.queue().len()
    }

    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        self.processor.with_worker(|worker| f(worker.sink.inner_mut()))
    }

    /// Drops queued commands, lifts all contacts and resets counters and uptime.
    pub fn reinitialize(&self) {
        self.processor.reset();
        self.stats.reset();
    }

    pub fn into_sink(self) -> S {
        let Worker { sink, .. } = self.processor.into_worker();
        sink.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NormalizedEvent;

    fn device() -> TouchDevice<Vec<NormalizedEvent>> {
        TouchDevice::new(TouchBounds::default(), Vec::new())
    }

    #[test]
    fn test_valid_command_is_queued_and_decoded() {
        let touch = device();

        assert_eq!(touch.inject(TouchCommand::Tap { x: 100, y: 200 }), Ok(true));
        assert_eq!(touch.run_deferred(), 1);

        assert_eq!(touch.stats().snapshot().taps, 1);
        assert_eq!(touch.with_sink(|events| events.iter().filter(|e| e.is_sync()).count()), 2);
    }

    #[test]
    fn test_out_of_bounds_command_is_rejected_wholesale() {
        // Arrange
        let touch = device();

        // Act
        let result = touch.inject(TouchCommand::Contact { x: 10, y: 10, pressure: 300 });

        // Assert
        assert_eq!(
            result,
            Err(InjectError::OutOfBounds { field: "pressure", value: 300, max: 255 })
        );
        assert_eq!(touch.queued(), 0);
        touch.run_deferred();
        assert!(touch.with_sink(|events| events.is_empty()));
        let snap = touch.stats().snapshot();
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.moves, 0);
    }

    #[test]
    fn test_custom_bounds_are_enforced() {
        let touch = TouchDevice::new(
            TouchBounds { max_x: 100, max_y: 50, max_pressure: 10 },
            Vec::new(),
        );

        assert!(touch.inject(TouchCommand::Tap { x: 100, y: 50 }).is_ok());
        assert!(touch.inject(TouchCommand::Tap { x: 101, y: 0 }).is_err());
    }

    #[test]
    fn test_full_queue_counts_overflow() {
        let touch = TouchDevice::with_capacity(TouchBounds::default(), Vec::new(), 2);

        assert_eq!(touch.inject(TouchCommand::Scroll { dx: 0, dy: 1 }), Ok(true));
        assert_eq!(touch.inject(TouchCommand::Scroll { dx: 0, dy: 1 }), Ok(false));

        assert_eq!(touch.stats().snapshot().overflows, 1);
    }
}
