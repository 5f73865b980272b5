//! Emulated keyboard.

use std::sync::Arc;

use tracing::warn;

use crate::config::ConfigurationStore;
use crate::decoder::{KeycodeDecoder, Lock};
use crate::event::DeviceClass;
use crate::processor::{DeferredProcessor, Worker};
use crate::queue::{IngressQueue, KEYBOARD_QUEUE_CAPACITY};
use crate::sink::{CapabilityGuard, EventSink};
use crate::stats::{IndicatorSnapshot, KeyboardIndicators, KeyboardStats};

/// A keyboard fed one scan-code byte at a time.
#[derive(Debug)]
pub struct KeyboardDevice<S: EventSink> {
    processor: DeferredProcessor<KeycodeDecoder, CapabilityGuard<S>>,
    config: Arc<ConfigurationStore>,
    stats: Arc<KeyboardStats>,
    indicators: Arc<KeyboardIndicators>,
}

impl<S: EventSink> KeyboardDevice<S> {
    pub fn new(config: Arc<ConfigurationStore>, sink: S) -> Self {
        Self::with_capacity(config, sink, KEYBOARD_QUEUE_CAPACITY)
    }

    pub fn with_capacity(config: Arc<ConfigurationStore>, sink: S, capacity: usize) -> Self {
        let stats = Arc::new(KeyboardStats::default());
        let indicators = Arc::new(KeyboardIndicators::default());
        let decoder = KeycodeDecoder::new(Arc::clone(&stats), Arc::clone(&indicators));
        let guard = CapabilityGuard::new(DeviceClass::Keyboard, decoder.capabilities(), sink);
        Self {
            processor: DeferredProcessor::new(Arc::new(IngressQueue::new(capacity)), decoder, guard),
            config,
            stats,
            indicators,
        }
    }

    /// Queues one scan code.  Returns `false` if the queue was full.
    pub fn inject_scancode(&self, scancode: u8) -> bool {
        if self.processor.queue().push(scancode) {
            true
        } else {
            self.stats.inc_overflow();
            warn!(scancode, "keyboard queue full, scan code dropped");
            false
        }
    }

    /// Drains queued scan codes into the sink.  Returns how many were decoded.
    pub fn run_deferred(&self) -> usize {
        self.processor.activate()
    }

    /// Drains the queue, waiting for a running drain to finish first.
    pub fn flush(&self) -> usize {
        self.processor.flush()
    }

    /// Writes one lock indicator.
    ///
    /// Scan codes queued before the call are decoded first, so a queued lock
    /// key cannot toggle over the written value afterwards.
    pub fn set_lock(&self, lock: Lock, on: bool) {
        self.processor
            .with_flushed_worker(|worker| worker.decoder.set_lock(lock, on));
    }

    pub fn stats(&self) -> &Arc<KeyboardStats> {
        &self.stats
    }

    /// Modifier and lock state as last published by the decoder.
    pub fn indicators(&self) -> IndicatorSnapshot {
        self.indicators.snapshot()
    }

    pub fn config(&self) -> &Arc<ConfigurationStore> {
        &self.config
    }

    /// Units waiting for the next drain.
    pub fn queued(&self) -> usize {
        self.processor.queue().len()
    }

    /// Runs `f` against the downstream sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        self.processor.with_worker(|worker| f(worker.sink.inner_mut()))
    }

    /// Drops queued input and resets decoder state, counters and uptime.
    pub fn reinitialize(&self) {
        self.processor.reset();
        self.stats.reset();
    }

    /// Consumes the device, returning its sink.
    pub fn into_sink(self) -> S {
        let Worker { sink, .. } = self.processor.into_worker();
        sink.into_inner()
    }
}
