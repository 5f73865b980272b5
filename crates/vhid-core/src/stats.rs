//! Per-device monotonic counters and the read-only observability snapshot.
//!
//! Counters are plain atomics incremented with `Ordering::Relaxed`: each one
//! is independent, nobody derives ordering from them, and an increment must
//! never wait on the decode path.  They only move forward, except when the
//! owning device is reinitialised.
//!
//! Each device owns its counter block behind an `Arc`; the
//! [`StatisticsRegistry`] holds clones of those `Arc`s and produces one
//! combined [`StatisticsSnapshot`] for the reporting surface.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

// ── Uptime ────────────────────────────────────────────────────────────────────

/// Start instant of a device, rewound on reinitialisation.
#[derive(Debug)]
struct Uptime(Mutex<Instant>);

impl Uptime {
    fn new() -> Self {
        Self(Mutex::new(Instant::now()))
    }

    fn elapsed(&self) -> Duration {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    fn restart(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }
}

impl Default for Uptime {
    fn default() -> Self {
        Self::new()
    }
}

// ── Keyboard ──────────────────────────────────────────────────────────────────

/// Keyboard counters.
#[derive(Debug, Default)]
pub struct KeyboardStats {
    key_presses: AtomicU64,
    key_releases: AtomicU64,
    overflows: AtomicU64,
    unknown_scancodes: AtomicU64,
    combos: AtomicU64,
    uptime: Uptime,
}

/// Point-in-time copy of [`KeyboardStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyboardSnapshot {
    pub uptime_secs: u64,
    pub key_presses: u64,
    pub key_releases: u64,
    pub overflows: u64,
    pub unknown_scancodes: u64,
    pub combos: u64,
}

impl KeyboardStats {
    #[inline]
    pub fn inc_press(&self) {
        self.key_presses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_release(&self) {
        self.key_releases.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_unknown(&self) {
        self.unknown_scancodes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_combo(&self) {
        self.combos.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> KeyboardSnapshot {
        KeyboardSnapshot {
            uptime_secs: self.uptime.elapsed().as_secs(),
            key_presses: self.key_presses.load(Ordering::Relaxed),
            key_releases: self.key_releases.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            unknown_scancodes: self.unknown_scancodes.load(Ordering::Relaxed),
            combos: self.combos.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter and restarts the uptime clock.
    pub fn reset(&self) {
        self.key_presses.store(0, Ordering::Relaxed);
        self.key_releases.store(0, Ordering::Relaxed);
        self.overflows.store(0, Ordering::Relaxed);
        self.unknown_scancodes.store(0, Ordering::Relaxed);
        self.combos.store(0, Ordering::Relaxed);
        self.uptime.restart();
    }
}

/// Modifier and lock state published by the keyboard decoder.
///
/// Only the decoder writes these flags; everyone else reads them.
#[derive(Debug, Default)]
pub struct KeyboardIndicators {
    shift: AtomicBool,
    ctrl: AtomicBool,
    alt: AtomicBool,
    caps_lock: AtomicBool,
    num_lock: AtomicBool,
    scroll_lock: AtomicBool,
}

/// Point-in-time copy of [`KeyboardIndicators`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub caps_lock: bool,
    pub num_lock: bool,
    pub scroll_lock: bool,
}

impl KeyboardIndicators {
    /// Overwrites every flag from a decoder state copy.
    pub fn publish(&self, state: IndicatorSnapshot) {
        self.shift.store(state.shift, Ordering::Relaxed);
        self.ctrl.store(state.ctrl, Ordering::Relaxed);
        self.alt.store(state.alt, Ordering::Relaxed);
        self.caps_lock.store(state.caps_lock, Ordering::Relaxed);
        self.num_lock.store(state.num_lock, Ordering::Relaxed);
        self.scroll_lock.store(state.scroll_lock, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            shift: self.shift.load(Ordering::Relaxed),
            ctrl: self.ctrl.load(Ordering::Relaxed),
            alt: self.alt.load(Ordering::Relaxed),
            caps_lock: self.caps_lock.load(Ordering::Relaxed),
            num_lock: self.num_lock.load(Ordering::Relaxed),
            scroll_lock: self.scroll_lock.load(Ordering::Relaxed),
        }
    }
}

// ── Pointer ───────────────────────────────────────────────────────────────────

/// Pointer counters.
#[derive(Debug, Default)]
pub struct PointerStats {
    packets: AtomicU64,
    invalid_packets: AtomicU64,
    overflows: AtomicU64,
    total_clicks: AtomicU64,
    left_clicks: AtomicU64,
    right_clicks: AtomicU64,
    middle_clicks: AtomicU64,
    side_clicks: AtomicU64,
    forward_clicks: AtomicU64,
    scroll_events: AtomicU64,
    total_dx: AtomicI64,
    total_dy: AtomicI64,
    total_distance: AtomicU64,
    uptime: Uptime,
}

/// Buttons reported by one packet, for click accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonMask {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
    pub side: bool,
    pub forward: bool,
}

/// Point-in-time copy of [`PointerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointerSnapshot {
    pub uptime_secs: u64,
    pub packets: u64,
    pub invalid_packets: u64,
    pub overflows: u64,
    pub total_clicks: u64,
    pub left_clicks: u64,
    pub right_clicks: u64,
    pub middle_clicks: u64,
    pub side_clicks: u64,
    pub forward_clicks: u64,
    pub scroll_events: u64,
    pub total_dx: i64,
    pub total_dy: i64,
    pub total_distance: u64,
}

impl PointerStats {
    #[inline]
    pub fn inc_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_invalid(&self) {
        self.invalid_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_scroll(&self) {
        self.scroll_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one click per held button; several may count in one packet.
    pub fn record_clicks(&self, buttons: ButtonMask) {
        let per_button = [
            (buttons.left, &self.left_clicks),
            (buttons.right, &self.right_clicks),
            (buttons.middle, &self.middle_clicks),
            (buttons.side, &self.side_clicks),
            (buttons.forward, &self.forward_clicks),
        ];
        for (held, counter) in per_button {
            if held {
                counter.fetch_add(1, Ordering::Relaxed);
                self.total_clicks.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Accumulates scaled displacement and its Manhattan length.
    pub fn record_motion(&self, dx: i32, dy: i32) {
        self.total_dx.fetch_add(i64::from(dx), Ordering::Relaxed);
        self.total_dy.fetch_add(i64::from(dy), Ordering::Relaxed);
        let distance = u64::from(dx.unsigned_abs()) + u64::from(dy.unsigned_abs());
        self.total_distance.fetch_add(distance, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PointerSnapshot {
        PointerSnapshot {
            uptime_secs: self.uptime.elapsed().as_secs(),
            packets: self.packets.load(Ordering::Relaxed),
            invalid_packets: self.invalid_packets.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            total_clicks: self.total_clicks.load(Ordering::Relaxed),
            left_clicks: self.left_clicks.load(Ordering::Relaxed),
            right_clicks: self.right_clicks.load(Ordering::Relaxed),
            middle_clicks: self.middle_clicks.load(Ordering::Relaxed),
            side_clicks: self.side_clicks.load(Ordering::Relaxed),
            forward_clicks: self.forward_clicks.load(Ordering::Relaxed),
            scroll_events: self.scroll_events.load(Ordering::Relaxed),
            total_dx: self.total_dx.load(Ordering::Relaxed),
            total_dy: self.total_dy.load(Ordering::Relaxed),
            total_distance: self.total_distance.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter and restarts the uptime clock.
    pub fn reset(&self) {
        for counter in [
            &self.packets,
            &self.invalid_packets,
            &self.overflows,
            &self.total_clicks,
            &self.left_clicks,
            &self.right_clicks,
            &self.middle_clicks,
            &self.side_clicks,
            &self.forward_clicks,
            &self.scroll_events,
            &self.total_distance,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.total_dx.store(0, Ordering::Relaxed);
        self.total_dy.store(0, Ordering::Relaxed);
        self.uptime.restart();
    }
}

// ── Touch ─────────────────────────────────────────────────────────────────────

/// Touch surface counters.
#[derive(Debug, Default)]
pub struct TouchStats {
    touches: AtomicU64,
    moves: AtomicU64,
    taps: AtomicU64,
    two_finger_taps: AtomicU64,
    scrolls: AtomicU64,
    rejected: AtomicU64,
    overflows: AtomicU64,
    uptime: Uptime,
}

/// Point-in-time copy of [`TouchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TouchSnapshot {
    pub uptime_secs: u64,
    /// Completed contacts (lift events).
    pub touches: u64,
    /// Contact position updates.
    pub moves: u64,
    pub taps: u64,
    pub two_finger_taps: u64,
    pub scrolls: u64,
    pub rejected: u64,
    pub overflows: u64,
}

impl TouchStats {
    #[inline]
    pub fn inc_touch(&self) {
        self.touches.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_move(&self) {
        self.moves.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_tap(&self) {
        self.taps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_two_finger_tap(&self) {
        self.two_finger_taps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_scroll(&self) {
        self.scrolls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TouchSnapshot {
        TouchSnapshot {
            uptime_secs: self.uptime.elapsed().as_secs(),
            touches: self.touches.load(Ordering::Relaxed),
            moves: self.moves.load(Ordering::Relaxed),
            taps: self.taps.load(Ordering::Relaxed),
            two_finger_taps: self.two_finger_taps.load(Ordering::Relaxed),
            scrolls: self.scrolls.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter and restarts the uptime clock.
    pub fn reset(&self) {
        for counter in [
            &self.touches,
            &self.moves,
            &self.taps,
            &self.two_finger_taps,
            &self.scrolls,
            &self.rejected,
            &self.overflows,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.uptime.restart();
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Read-only view over the three devices' counter blocks.
#[derive(Debug, Clone, Default)]
pub struct StatisticsRegistry {
    keyboard: Arc<KeyboardStats>,
    pointer: Arc<PointerStats>,
    touch: Arc<TouchStats>,
}

/// Combined snapshot across all devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub keyboard: KeyboardSnapshot,
    pub pointer: PointerSnapshot,
    pub touch: TouchSnapshot,
}

impl StatisticsRegistry {
    pub fn new(
        keyboard: Arc<KeyboardStats>,
        pointer: Arc<PointerStats>,
        touch: Arc<TouchStats>,
    ) -> Self {
        Self {
            keyboard,
            pointer,
            touch,
        }
    }

    pub fn keyboard(&self) -> &Arc<KeyboardStats> {
        &self.keyboard
    }

    pub fn pointer(&self) -> &Arc<PointerStats> {
        &self.pointer
    }

    pub fn touch(&self) -> &Arc<TouchStats> {
        &self.touch
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            keyboard: self.keyboard.snapshot(),
            pointer: self.pointer.snapshot(),
            touch: self.touch.snapshot(),
        }
    }
}
