//! Emulated PS/2 pointer.

use std::sync::Arc;

use tracing::{debug, warn};

use super::InjectError;
use crate::config::{ConfigurationStore, PacketFraming};
use crate::decoder::{PacketDecoder, PointerUnit};
use crate::event::DeviceClass;
use crate::processor::{DeferredProcessor, Worker};
use crate::queue::{IngressQueue, POINTER_QUEUE_CAPACITY};
use crate::sink::{CapabilityGuard, EventSink};
use crate::stats::PointerStats;

/// A pointer fed raw packet bytes or whole packets.
#[derive(Debug)]
pub struct PointerDevice<S: EventSink> {
    processor: DeferredProcessor<PacketDecoder, CapabilityGuard<S>>,
    config: Arc<ConfigurationStore>,
    stats: Arc<PointerStats>,
}

impl<S: EventSink> PointerDevice<S> {
    pub fn new(config: Arc<ConfigurationStore>, sink: S) -> Self {
        Self::with_capacity(config, sink, POINTER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(config: Arc<ConfigurationStore>, sink: S, capacity: usize) -> Self {
        let stats = Arc::new(PointerStats::default());
        let decoder = PacketDecoder::new(Arc::clone(&config), Arc::clone(&stats));
        let guard = CapabilityGuard::new(DeviceClass::Pointer, PacketDecoder::capabilities(), sink);
        Self {
            processor: DeferredProcessor::new(Arc::new(IngressQueue::new(capacity)), decoder, guard),
            config,
            stats,
        }
    }

    /// Queues a single raw byte of the packet stream.
    pub fn inject_byte(&self, byte: u8) -> bool {
        if self.processor.queue().push(PointerUnit::Byte(byte)) {
            true
        } else {
            self.stats.inc_overflow();
            warn!(byte, "pointer queue full, byte dropped");
            false
        }
    }

    /// Queues one complete 3- or 4-byte packet.
    ///
    /// The packet's length is fixed here, at injection: a framing marker is
    /// queued ahead of its bytes, so a later framing change cannot reframe it
    /// and a partial raw-byte packet still in assembly is discarded.  A 3-byte
    /// packet while 4-byte framing is configured is assembled as a single
    /// 3-byte packet.  A 4-byte packet under 3-byte framing contributes only
    /// its first 3 bytes.  The packet is queued whole or not at all: when it
    /// does not fit, it is dropped and counted as one overflow.
    pub fn inject_packet(&self, packet: &[u8]) -> Result<bool, InjectError> {
        let framing = PacketFraming::from_len(packet.len())
            .ok_or(InjectError::PacketLength(packet.len()))?;

        let framing = match (self.config.packet_framing(), framing) {
            (PacketFraming::Standard, PacketFraming::IntelliMouse) => {
                debug!("standard framing, ignoring fourth packet byte");
                PacketFraming::Standard
            }
            (_, framing) => framing,
        };
        let bytes = &packet[..framing.packet_len()];

        let mut units = Vec::with_capacity(5);
        units.push(PointerUnit::Frame(framing));
        units.extend(bytes.iter().copied().map(PointerUnit::Byte));

        let queue = self.processor.queue();
        if queue.remaining() < units.len() {
            self.stats.inc_overflow();
            warn!(len = packet.len(), "pointer queue full, packet dropped");
            return Ok(false);
        }
        for unit in units {
            queue.push(unit);
        }
        Ok(true)
    }

    /// Drains queued bytes into the sink.  Returns how many units were consumed.
    pub fn run_deferred(&self) -> usize {
        self.processor.activate()
    }

    /// Drains the queue, waiting for a running drain to finish first.
    pub fn flush(&self) -> usize {
        self.processor.flush()
    }

    pub fn stats(&self) -> &Arc<PointerStats> {
        &self.stats
    }

    pub fn config(&self) -> &Arc<ConfigurationStore> {
        &self.config
    }

    pub fn queued(&self) -> usize {
        self.processor.queue().len()
    }

    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        self.processor.with_worker(|worker| f(worker.sink.inner_mut()))
    }

    /// Drops queued bytes and any partial packet, and resets counters and uptime.
    pub fn reinitialize(&self) {
        self.processor.reset();
        self.stats.reset();
    }

    pub fn into_sink(self) -> S {
        let Worker { sink, .. } = self.processor.into_worker();
        sink.into_inner()
    }
}
