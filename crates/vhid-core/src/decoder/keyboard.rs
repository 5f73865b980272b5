//! Scan-code state machine for the emulated keyboard.
//!
//! Each byte is one set-1 scan code.  The decoder:
//!
//! 1. splits off the release flag (high bit) and masks to 7 bits,
//! 2. looks the index up in the [`ScancodeTable`]; unmapped codes are counted
//!    and produce nothing,
//! 3. tracks Shift/Ctrl/Alt as *held* flags (level: press sets, release clears),
//! 4. toggles Caps/Num/Scroll Lock on press edges only,
//! 5. checks the combo rules on press edges and logs any match,
//! 6. counts the press or release,
//! 7. emits one key event followed by a sync marker.
//!
//! Combos are informational.  A match bumps the combo counter and logs at
//! `info`; the key event itself is always emitted unchanged.
//!
//! Key repeat is not generated here.  The decoder emits discrete edges and the
//! downstream consumer owns auto-repeat.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::Decoder;
use crate::event::{DeviceClass, NormalizedEvent};
use crate::keymap::{split_scancode, KeyCode, ScancodeTable};
use crate::sink::{CapabilitySet, EventSink};
use crate::stats::{IndicatorSnapshot, KeyboardIndicators, KeyboardStats};

// ── Combos ────────────────────────────────────────────────────────────────────

/// Well-known shortcuts recognised on press edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combo {
    CtrlC,
    CtrlZ,
    CtrlV,
    CtrlX,
    AltTab,
    AltF4,
    CtrlAltDelete,
}

impl Combo {
    /// Human-readable label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Combo::CtrlC => "Ctrl+C (interrupt)",
            Combo::CtrlZ => "Ctrl+Z (suspend)",
            Combo::CtrlV => "Ctrl+V (paste)",
            Combo::CtrlX => "Ctrl+X (cut)",
            Combo::AltTab => "Alt+Tab (switch window)",
            Combo::AltF4 => "Alt+F4 (close window)",
            Combo::CtrlAltDelete => "Ctrl+Alt+Delete",
        }
    }
}

/// One combo rule: required modifiers plus the primary key.
struct ComboRule {
    combo: Combo,
    ctrl: bool,
    alt: bool,
    key: KeyCode,
}

const COMBO_RULES: [ComboRule; 7] = [
    ComboRule { combo: Combo::CtrlC, ctrl: true, alt: false, key: KeyCode::C },
    ComboRule { combo: Combo::CtrlZ, ctrl: true, alt: false, key: KeyCode::Z },
    ComboRule { combo: Combo::CtrlV, ctrl: true, alt: false, key: KeyCode::V },
    ComboRule { combo: Combo::CtrlX, ctrl: true, alt: false, key: KeyCode::X },
    ComboRule { combo: Combo::AltTab, ctrl: false, alt: true, key: KeyCode::Tab },
    ComboRule { combo: Combo::AltF4, ctrl: false, alt: true, key: KeyCode::F4 },
    ComboRule { combo: Combo::CtrlAltDelete, ctrl: true, alt: true, key: KeyCode::Delete },
];

// ── Locks ─────────────────────────────────────────────────────────────────────

/// A lock whose indicator can be written from outside the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lock {
    Caps,
    Num,
    Scroll,
}

impl Lock {
    pub fn name(self) -> &'static str {
        match self {
            Lock::Caps => "caps",
            Lock::Num => "num",
            Lock::Scroll => "scroll",
        }
    }

    /// Reads this lock's flag from an indicator snapshot.
    pub fn is_on(self, indicators: &IndicatorSnapshot) -> bool {
        match self {
            Lock::Caps => indicators.caps_lock,
            Lock::Num => indicators.num_lock,
            Lock::Scroll => indicators.scroll_lock,
        }
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Keyboard modifier and lock state.  Owned by the consumer context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ModifierState {
    shift: bool,
    ctrl: bool,
    alt: bool,
    caps_lock: bool,
    num_lock: bool,
    scroll_lock: bool,
}

impl From<ModifierState> for IndicatorSnapshot {
    fn from(s: ModifierState) -> Self {
        IndicatorSnapshot {
            shift: s.shift,
            ctrl: s.ctrl,
            alt: s.alt,
            caps_lock: s.caps_lock,
            num_lock: s.num_lock,
            scroll_lock: s.scroll_lock,
        }
    }
}

/// Translates scan-code bytes into key events.
#[derive(Debug)]
pub struct KeycodeDecoder {
    table: ScancodeTable,
    state: ModifierState,
    stats: Arc<KeyboardStats>,
    indicators: Arc<KeyboardIndicators>,
}

impl KeycodeDecoder {
    pub fn new(stats: Arc<KeyboardStats>, indicators: Arc<KeyboardIndicators>) -> Self {
        Self {
            table: ScancodeTable::set1(),
            state: ModifierState::default(),
            stats,
            indicators,
        }
    }

    /// Every key code the table can produce.
    pub fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new().with_keys(self.table.mapped_codes().map(KeyCode::as_u16))
    }

    /// Current modifier and lock state.
    pub fn indicators(&self) -> IndicatorSnapshot {
        self.state.into()
    }

    /// Combos matched by a press of `key` under the current modifier state.
    pub fn matching_combos(&self, key: KeyCode) -> impl Iterator<Item = Combo> + '_ {
        COMBO_RULES
            .iter()
            .filter(move |rule| {
                rule.key == key
                    && (!rule.ctrl || self.state.ctrl)
                    && (!rule.alt || self.state.alt)
            })
            .map(|rule| rule.combo)
    }

    /// Overwrites one lock flag, as a host LED write would.
    ///
    /// Emits nothing; the next lock-key press toggles from the new state.
    pub fn set_lock(&mut self, lock: Lock, on: bool) {
        match lock {
            Lock::Caps => self.state.caps_lock = on,
            Lock::Num => self.state.num_lock = on,
            Lock::Scroll => self.state.scroll_lock = on,
        }
        self.indicators.publish(self.state.into());
        info!(lock = lock.name(), on, "lock indicator set");
    }

    /// Processes one scan-code byte.
    pub fn decode(&mut self, byte: u8, sink: &mut dyn EventSink) {
        let (index, release) = split_scancode(byte);
        let pressed = !release;

        let Some(key) = self.table.lookup(index) else {
            self.stats.inc_unknown();
            debug!(scancode = byte, "no key mapped for scan code");
            return;
        };

        if key.is_shift() {
            self.state.shift = pressed;
        } else if key.is_ctrl() {
            self.state.ctrl = pressed;
        } else if key.is_alt() {
            self.state.alt = pressed;
        }

        if pressed {
            match key {
                KeyCode::CapsLock => self.state.caps_lock = !self.state.caps_lock,
                KeyCode::NumLock => self.state.num_lock = !self.state.num_lock,
                KeyCode::ScrollLock => self.state.scroll_lock = !self.state.scroll_lock,
                _ => {}
            }

            for combo in self.matching_combos(key) {
                self.stats.inc_combo();
                info!(combo = combo.label(), "key combo detected");
            }
            self.stats.inc_press();
        } else {
            self.stats.inc_release();
        }

        self.indicators.publish(self.state.into());

        sink.emit(NormalizedEvent::key(
            DeviceClass::Keyboard,
            key.as_u16(),
            pressed,
        ));
        sink.emit(NormalizedEvent::sync(DeviceClass::Keyboard));

        trace!(
            scancode = byte,
            keycode = key.as_u16(),
            pressed,
            shift = self.state.shift,
            ctrl = self.state.ctrl,
            alt = self.state.alt,
            "scan code decoded"
        );
    }
}

impl Decoder for KeycodeDecoder {
    type Unit = u8;

    fn feed(&mut self, unit: u8, sink: &mut dyn EventSink) {
        self.decode(unit, sink);
    }

    fn reset(&mut self) {
        self.state = ModifierState::default();
        self.indicators.publish(self.state.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::sink::MockEventSink;

    fn decoder() -> (KeycodeDecoder, Arc<KeyboardStats>) {
        let stats = Arc::new(KeyboardStats::default());
        let decoder = KeycodeDecoder::new(Arc::clone(&stats), Arc::default());
        (decoder, stats)
    }

    fn key_events(events: &[NormalizedEvent]) -> Vec<(u16, i32)> {
        events
            .iter()
            .filter(|e| e.kind == EventKind::Key)
            .map(|e| (e.code, e.value))
            .collect()
    }

    #[test]
    fn test_press_then_release_emits_key_and_sync_pairs() {
        // Arrange
        let (mut dec, stats) = decoder();
        let mut sink = Vec::new();

        // Act
        dec.decode(0x1E, &mut sink);
        dec.decode(0x9E, &mut sink);

        // Assert
        assert_eq!(
            sink,
            vec![
                NormalizedEvent::key(DeviceClass::Keyboard, KeyCode::A.as_u16(), true),
                NormalizedEvent::sync(DeviceClass::Keyboard),
                NormalizedEvent::key(DeviceClass::Keyboard, KeyCode::A.as_u16(), false),
                NormalizedEvent::sync(DeviceClass::Keyboard),
            ]
        );
        assert_eq!(dec.indicators(), IndicatorSnapshot::default());
        let snap = stats.snapshot();
        assert_eq!((snap.key_presses, snap.key_releases), (1, 1));
    }

    #[test]
    fn test_unmapped_code_is_counted_and_emits_nothing() {
        let (mut dec, stats) = decoder();
        let mut mock = MockEventSink::new();
        mock.expect_emit().times(0);

        dec.decode(0x54, &mut mock);
        dec.decode(0x00, &mut mock);
        dec.decode(0xD4, &mut mock);

        let snap = stats.snapshot();
        assert_eq!(snap.unknown_scancodes, 3);
        assert_eq!(snap.key_presses + snap.key_releases, 0);
    }

    #[test]
    fn test_ctrl_c_counts_one_combo_and_keeps_events_unaltered() {
        // Arrange
        let (mut dec, stats) = decoder();
        let mut sink = Vec::new();

        // Act
        dec.decode(0x1D, &mut sink);
        dec.decode(0x2E, &mut sink);

        // Assert
        assert_eq!(stats.snapshot().combos, 1);
        assert_eq!(
            key_events(&sink),
            vec![(KeyCode::LeftCtrl.as_u16(), 1), (KeyCode::C.as_u16(), 1)]
        );
    }

    #[test]
    fn test_combo_not_counted_on_release_or_without_modifier() {
        let (mut dec, stats) = decoder();
        let mut sink = Vec::new();

        dec.decode(0x2E, &mut sink); // C without Ctrl
        dec.decode(0x1D, &mut sink);
        dec.decode(0xAE, &mut sink); // C release with Ctrl held
        dec.decode(0x9D, &mut sink);
        dec.decode(0x2E, &mut sink); // Ctrl released again

        assert_eq!(stats.snapshot().combos, 0);
    }

    #[test]
    fn test_ctrl_alt_delete_matches_only_the_three_key_rule() {
        let (mut dec, stats) = decoder();
        let mut sink = Vec::new();

        dec.decode(0x1D, &mut sink);
        dec.decode(0x38, &mut sink);
        dec.decode(0x6F, &mut sink);

        assert_eq!(stats.snapshot().combos, 1);
    }

    #[test]
    fn test_right_hand_modifiers_count_for_combos() {
        let (mut dec, stats) = decoder();
        let mut sink = Vec::new();

        dec.decode(0x7E, &mut sink); // RightAlt
        dec.decode(0x0F, &mut sink); // Tab
        dec.decode(0x3E, &mut sink); // F4

        assert_eq!(stats.snapshot().combos, 2);
    }

    #[test]
    fn test_caps_lock_toggles_on_press_edges_only() {
        // Arrange
        let (mut dec, _) = decoder();
        let mut sink = Vec::new();

        // Act + Assert
        dec.decode(0x3A, &mut sink);
        assert!(dec.indicators().caps_lock);
        dec.decode(0xBA, &mut sink);
        assert!(dec.indicators().caps_lock);
        dec.decode(0x3A, &mut sink);
        assert!(!dec.indicators().caps_lock);
    }

    #[test]
    fn test_num_and_scroll_lock_toggle_independently() {
        let (mut dec, _) = decoder();
        let mut sink = Vec::new();

        dec.decode(0x45, &mut sink);
        dec.decode(0x46, &mut sink);
        dec.decode(0x46, &mut sink);

        let state = dec.indicators();
        assert!(state.num_lock);
        assert!(!state.scroll_lock);
        assert!(!state.caps_lock);
    }

    #[test]
    fn test_shift_flag_follows_level() {
        let (mut dec, _) = decoder();
        let mut sink = Vec::new();

        dec.decode(0x36, &mut sink);
        assert!(dec.indicators().shift);
        dec.decode(0xB6, &mut sink);
        assert!(!dec.indicators().shift);
    }

    #[test]
    fn test_indicators_are_published_to_shared_block() {
        let stats = Arc::new(KeyboardStats::default());
        let indicators = Arc::new(KeyboardIndicators::default());
        let mut dec = KeycodeDecoder::new(stats, Arc::clone(&indicators));
        let mut sink = Vec::new();

        dec.decode(0x1D, &mut sink);
        dec.decode(0x3A, &mut sink);

        let published = indicators.snapshot();
        assert!(published.ctrl);
        assert!(published.caps_lock);
    }

    #[test]
    fn test_reset_clears_modifier_and_lock_state() {
        let (mut dec, _) = decoder();
        let mut sink = Vec::new();
        dec.decode(0x2A, &mut sink);
        dec.decode(0x3A, &mut sink);

        Decoder::reset(&mut dec);

        assert_eq!(dec.indicators(), IndicatorSnapshot::default());
    }

    #[test]
    fn test_emitted_key_count_matches_mapped_input_bytes() {
        // Arrange
        let (mut dec, _) = decoder();
        let table = ScancodeTable::set1();
        let mut sink = Vec::new();

        // Act
        for byte in 0..=255u8 {
            dec.decode(byte, &mut sink);
        }

        // Assert
        let expected = (0..=255u8)
            .filter(|b| table.lookup(b & 0x7F).is_some())
            .count();
        assert_eq!(key_events(&sink).len(), expected);
        assert_eq!(sink.iter().filter(|e| e.is_sync()).count(), expected);
    }

    #[test]
    fn test_capabilities_cover_every_mapped_key() {
        let (dec, _) = decoder();

        let caps = dec.capabilities();

        assert_eq!(caps.len(), 118);
        assert!(caps.permits(EventKind::Key, KeyCode::Search.as_u16()));
    }

    #[test]
    fn test_set_lock_overrides_state_and_next_press_toggles_from_it() {
        // Arrange
        let (mut dec, _) = decoder();
        let mut sink: Vec<NormalizedEvent> = Vec::new();

        // Act
        dec.set_lock(Lock::Caps, true);
        let after_set = dec.indicators();
        dec.decode(0x3A, &mut sink);

        // Assert
        assert!(after_set.caps_lock);
        assert!(!after_set.num_lock);
        assert!(sink.iter().all(|e| e.code == KeyCode::CapsLock.as_u16() || e.is_sync()));
        assert!(!dec.indicators().caps_lock);
    }

    #[test]
    fn test_set_lock_emits_no_events() {
        let (mut dec, stats) = decoder();

        dec.set_lock(Lock::Scroll, true);
        dec.set_lock(Lock::Num, true);

        let snap = dec.indicators();
        assert!(snap.scroll_lock && snap.num_lock);
        assert_eq!(stats.snapshot().key_presses, 0);
    }
}
