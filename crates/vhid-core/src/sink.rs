//! Downstream event sink seam and the capability guard in front of it.
//!
//! Decoders never talk to a concrete consumer.  They push each
//! [`NormalizedEvent`] into an [`EventSink`]; the composition root decides
//! whether that is an in-memory vector, a JSON-lines log, a tracing sink, or a
//! mock in tests.
//!
//! Every device declares at construction which `(kind, code)` pairs it can
//! produce.  [`CapabilityGuard`] sits between the decoder and the real sink and
//! drops anything outside that set, so the consumer never sees an undeclared
//! code even if a decoder is wrong.

use std::collections::BTreeSet;

use tracing::warn;

use crate::event::{DeviceClass, EventKind, NormalizedEvent};

/// Accepts normalized events, in order.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send {
    fn emit(&mut self, event: NormalizedEvent);
}

impl EventSink for Vec<NormalizedEvent> {
    fn emit(&mut self, event: NormalizedEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: NormalizedEvent) {
        (**self).emit(event);
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

/// The `(kind, code)` pairs a device may emit.  Sync is always allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    allowed: BTreeSet<(EventKind, u16)>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.allowed
            .extend(codes.into_iter().map(|code| (EventKind::Key, code)));
        self
    }

    pub fn with_relative(mut self, axes: impl IntoIterator<Item = u16>) -> Self {
        self.allowed
            .extend(axes.into_iter().map(|axis| (EventKind::RelativeAxis, axis)));
        self
    }

    pub fn with_absolute(mut self, axes: impl IntoIterator<Item = u16>) -> Self {
        self.allowed
            .extend(axes.into_iter().map(|axis| (EventKind::AbsoluteAxis, axis)));
        self
    }

    pub fn permits(&self, kind: EventKind, code: u16) -> bool {
        kind == EventKind::Sync || self.allowed.contains(&(kind, code))
    }

    /// Number of declared non-sync pairs.
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Forwards declared events to the inner sink and drops the rest.
#[derive(Debug)]
pub struct CapabilityGuard<S> {
    device: DeviceClass,
    capabilities: CapabilitySet,
    inner: S,
    dropped: u64,
}

impl<S: EventSink> CapabilityGuard<S> {
    pub fn new(device: DeviceClass, capabilities: CapabilitySet, inner: S) -> Self {
        Self {
            device,
            capabilities,
            inner,
            dropped: 0,
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Events dropped for being outside the declared set.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: EventSink> EventSink for CapabilityGuard<S> {
    fn emit(&mut self, event: NormalizedEvent) {
        if event.device == self.device && self.capabilities.permits(event.kind, event.code) {
            self.inner.emit(event);
        } else {
            self.dropped += 1;
            warn!(
                device = self.device.as_str(),
                kind = event.kind.label(),
                code = event.code,
                "dropping event outside the declared capability set"
            );
        }
    }
}
