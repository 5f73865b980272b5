//! Deferred drain of an ingress queue into its decoder.
//!
//! The producer pushes a unit and calls [`DeferredProcessor::activate`].  The
//! activation drains the queue to empty through the decoder and returns; it
//! never waits for more data.
//!
//! # Coalescing (for beginners)
//!
//! Several producers' activations may overlap.  Only one drain per device may
//! run at a time, so a second activation that finds the worker busy does not
//! wait: it sets a `pending` flag and returns.  The running drain re-checks
//! that flag after it releases the worker and loops once more if it was set.
//! Every pushed unit is therefore drained by *some* activation, and decoder
//! state is never touched by two threads at once.
//!
//! ```text
//!  activate ──► pending = true ──► try_lock(worker)
//!                                   │ busy → return 0 (the holder will loop)
//!                                   ▼
//!                         pending = false, drain queue, unlock
//!                                   │
//!                         pending set again? ── yes ──► try_lock again
//!                                   │ no
//!                                   ▼
//!                                 return
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

use tracing::trace;

use crate::decoder::Decoder;
use crate::queue::IngressQueue;
use crate::sink::EventSink;

/// The consumer-side pair: decoder state plus the sink it writes to.
#[derive(Debug)]
pub struct Worker<D, S> {
    pub decoder: D,
    pub sink: S,
}

/// Drains one device's queue; never runs concurrently with itself.
pub struct DeferredProcessor<D: Decoder, S> {
    queue: Arc<IngressQueue<D::Unit>>,
    worker: Mutex<Worker<D, S>>,
    pending: AtomicBool,
}

impl<D: Decoder, S> std::fmt::Debug for DeferredProcessor<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredProcessor")
            .field("queued", &self.queue.len())
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<D, S> DeferredProcessor<D, S>
where
    D: Decoder,
    S: EventSink,
{
    pub fn new(queue: Arc<IngressQueue<D::Unit>>, decoder: D, sink: S) -> Self {
        Self {
            queue,
            worker: Mutex::new(Worker { decoder, sink }),
            pending: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &Arc<IngressQueue<D::Unit>> {
        &self.queue
    }

    /// Drains the queue unless another activation is already draining it.
    ///
    /// Returns the number of units this call consumed.  A call that coalesced
    /// into a running drain returns 0.
    pub fn activate(&self) -> usize {
        self.pending.store(true, Ordering::SeqCst);
        let mut drained = 0;

        loop {
            let mut worker = match self.worker.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return drained,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };

            self.pending.store(false, Ordering::SeqCst);
            drained += self.drain_into(&mut worker);
            drop(worker);

            // A push that raced with the tail of the drain left `pending` set.
            if !self.pending.load(Ordering::SeqCst) {
                break;
            }
        }

        trace!(drained, "deferred drain finished");
        drained
    }

    /// Drains the queue to empty, waiting for a running drain to finish first.
    ///
    /// Unlike [`activate`](Self::activate), this never returns while units
    /// pushed before the call are still queued.
    pub fn flush(&self) -> usize {
        self.with_worker(|worker| self.drain_into(worker))
    }

    /// Like [`with_worker`](Self::with_worker), but decodes everything queued
    /// before `f` sees the decoder.
    pub fn with_flushed_worker<R>(&self, f: impl FnOnce(&mut Worker<D, S>) -> R) -> R {
        self.with_worker(|worker| {
            self.drain_into(worker);
            f(worker)
        })
    }

    fn drain_into(&self, worker: &mut Worker<D, S>) -> usize {
        let Worker { decoder, sink } = worker;
        let mut drained = 0;
        while let Some(unit) = self.queue.pop() {
            decoder.feed(unit, sink);
            drained += 1;
        }
        drained
    }

    /// Runs `f` with exclusive access to the decoder and sink.
    ///
    /// Blocks until any running drain finishes.
    pub fn with_worker<R>(&self, f: impl FnOnce(&mut Worker<D, S>) -> R) -> R {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut worker)
    }

    /// Clears the queue and returns the decoder to its initial state.
    pub fn reset(&self) {
        self.with_worker(|worker| {
            self.queue.clear();
            worker.decoder.reset();
        });
    }

    /// Consumes the processor, returning the decoder and sink.
    pub fn into_worker(self) -> Worker<D, S> {
        self.worker
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
