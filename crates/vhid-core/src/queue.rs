//! Bounded ingress ring between the injection path and the deferred drain.
//!
//! # Overflow behaviour
//!
//! A push into a full ring returns `false` and the unit is dropped.  The queue
//! never blocks and never grows; the owning device counts the drop.
//!
//! # Capacity (for beginners)
//!
//! The ring keeps one slot free to tell "full" apart from "empty" using only
//! the two indices: empty is `head == tail`, full is `(head + 1) % N == tail`.
//! A ring built with capacity N therefore holds at most N − 1 units.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Ring capacity for the keyboard device.
pub const KEYBOARD_QUEUE_CAPACITY: usize = 256;
/// Ring capacity for the pointer device.
pub const POINTER_QUEUE_CAPACITY: usize = 512;
/// Ring capacity for the touch device.
pub const TOUCH_QUEUE_CAPACITY: usize = 256;

/// Bounded single-producer/single-consumer FIFO of raw stimulus units.
///
/// One short-held mutex guards the indices and slots.  It is never held
/// across decoding, so a producer waits at most for one `pop` to finish.
#[derive(Debug)]
pub struct IngressQueue<T> {
    ring: Mutex<Ring<T>>,
    capacity: usize,
}

#[derive(Debug)]
struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
}

impl<T> IngressQueue<T> {
    /// Creates a ring with `capacity` slots (`capacity - 1` usable).
    ///
    /// Capacities below 2 are raised to 2 so the ring can hold one unit.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            ring: Mutex::new(Ring {
                slots,
                head: 0,
                tail: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        // A panic while holding the lock cannot leave the indices torn.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a unit.  Returns `false` and drops the unit when full.
    pub fn push(&self, unit: T) -> bool {
        let mut ring = self.lock();
        let next = (ring.head + 1) % self.capacity;
        if next == ring.tail {
            return false;
        }
        let head = ring.head;
        ring.slots[head] = Some(unit);
        ring.head = next;
        true
    }

    /// Removes the oldest unit, or returns `None` when empty.
    pub fn pop(&self) -> Option<T> {
        let mut ring = self.lock();
        if ring.head == ring.tail {
            return None;
        }
        let tail = ring.tail;
        let unit = ring.slots[tail].take();
        ring.tail = (tail + 1) % self.capacity;
        unit
    }

    /// Number of queued units.
    pub fn len(&self) -> usize {
        let ring = self.lock();
        (ring.head + self.capacity - ring.tail) % self.capacity
    }

    pub fn is_empty(&self) -> bool {
        let ring = self.lock();
        ring.head == ring.tail
    }

    pub fn is_full(&self) -> bool {
        let ring = self.lock();
        (ring.head + 1) % self.capacity == ring.tail
    }

    /// Units that can still be pushed before the ring is full.
    ///
    /// With a single producer this can only grow between the call and the
    /// producer's next push.
    pub fn remaining(&self) -> usize {
        self.capacity - 1 - self.len()
    }

    /// Slot count N; at most N − 1 units fit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every queued unit and rewinds both indices.
    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.slots.iter_mut().for_each(|slot| *slot = None);
        ring.head = 0;
        ring.tail = 0;
    }
}
