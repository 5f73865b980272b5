//! PS/2 pointer packet assembler and translator.
//!
//! # Packet layout (for beginners)
//!
//! A PS/2 mouse reports in fixed-size packets.  The standard packet is 3 bytes;
//! the IntelliMouse extension adds a 4th:
//!
//! | Byte | Bits | Meaning                                            |
//! |------|------|----------------------------------------------------|
//! | 0    | 0–2  | left, right, middle button                         |
//! | 0    | 3    | always 1 (framing marker)                          |
//! | 0    | 4–5  | X / Y sign                                         |
//! | 0    | 6–7  | X / Y overflow                                     |
//! | 1    |      | X displacement, signed 8-bit                       |
//! | 2    |      | Y displacement, signed 8-bit, positive = up        |
//! | 3    | 0–3  | wheel, signed 4-bit (IntelliMouse only)            |
//! | 3    | 4–5  | side and forward buttons (IntelliMouse only)       |
//!
//! Bytes arrive one at a time through the ingress queue.  The decoder stages
//! them until a full packet is present, then translates it in one step.
//!
//! # Framing changes
//!
//! The packet length is read from the [`ConfigurationStore`] when the first
//! byte of a packet arrives and stays fixed until that packet completes.  A
//! framing change therefore takes effect at the next packet boundary.
//!
//! An injector can also queue a [`PointerUnit::Frame`] marker ahead of its
//! bytes to force the length of the next packet.  A marker arriving while a
//! packet is half assembled discards the partial bytes and restarts.

use std::sync::Arc;

use tracing::{debug, trace};

use super::Decoder;
use crate::config::{ConfigurationStore, PacketFraming};
use crate::event::{codes, DeviceClass, NormalizedEvent};
use crate::sink::{CapabilitySet, EventSink};
use crate::stats::{ButtonMask, PointerStats};

/// Bit masks for the status byte (byte 0).
pub mod status_bits {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const MIDDLE: u8 = 0x04;
    pub const ALWAYS_1: u8 = 0x08;
    pub const X_SIGN: u8 = 0x10;
    pub const Y_SIGN: u8 = 0x20;
    pub const X_OVERFLOW: u8 = 0x40;
    pub const Y_OVERFLOW: u8 = 0x80;
}

/// Bit masks for the IntelliMouse extension byte (byte 3).
pub mod extension_bits {
    pub const WHEEL_MASK: u8 = 0x0F;
    pub const WHEEL_SIGN: u8 = 0x08;
    pub const SIDE: u8 = 0x10;
    pub const FORWARD: u8 = 0x20;
}

/// One unit on the pointer ingress queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerUnit {
    /// A raw packet byte.
    Byte(u8),
    /// Forces the length of the next packet.
    Frame(PacketFraming),
}

/// A fully translated packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerPacket {
    pub buttons: ButtonMask,
    /// Scaled X displacement.
    pub dx: i32,
    /// Scaled Y displacement, already inverted to screen convention.
    pub dy: i32,
    /// Wheel clicks; zero for standard packets.
    pub scroll: i32,
    pub x_overflow: bool,
    pub y_overflow: bool,
}

/// Scales a raw displacement by `dpi_percent`, truncating toward zero.
pub fn scale_displacement(raw: i8, dpi_percent: u32) -> i32 {
    let dpi = i32::try_from(dpi_percent).unwrap_or(i32::MAX);
    i32::from(raw).saturating_mul(dpi) / 100
}

/// Sign-extends the 4-bit wheel nibble.
fn wheel_delta(extension: u8) -> i32 {
    let nibble = extension & extension_bits::WHEEL_MASK;
    if nibble & extension_bits::WHEEL_SIGN != 0 {
        i32::from(nibble) - 16
    } else {
        i32::from(nibble)
    }
}

/// Translates one complete packet.
///
/// `bytes` must hold exactly `framing.packet_len()` bytes.  Returns `None` when
/// the framing marker (bit 3 of byte 0) is clear.
pub fn parse_packet(bytes: &[u8], framing: PacketFraming, dpi_percent: u32) -> Option<PointerPacket> {
    let status = *bytes.first()?;
    if status & status_bits::ALWAYS_1 == 0 {
        return None;
    }

    let raw_dx = *bytes.get(1)? as i8;
    let raw_dy = *bytes.get(2)? as i8;

    let mut packet = PointerPacket {
        buttons: ButtonMask {
            left: status & status_bits::LEFT != 0,
            right: status & status_bits::RIGHT != 0,
            middle: status & status_bits::MIDDLE != 0,
            ..ButtonMask::default()
        },
        dx: scale_displacement(raw_dx, dpi_percent),
        // Device Y grows upward; output Y grows downward.
        dy: -scale_displacement(raw_dy, dpi_percent),
        scroll: 0,
        x_overflow: status & status_bits::X_OVERFLOW != 0,
        y_overflow: status & status_bits::Y_OVERFLOW != 0,
    };

    if framing == PacketFraming::IntelliMouse {
        let extension = *bytes.get(3)?;
        packet.scroll = wheel_delta(extension);
        packet.buttons.side = extension & extension_bits::SIDE != 0;
        packet.buttons.forward = extension & extension_bits::FORWARD != 0;
    }

    Some(packet)
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Assembles queued bytes into packets and emits pointer frames.
#[derive(Debug)]
pub struct PacketDecoder {
    assembly: [u8; 4],
    cursor: usize,
    /// Framing of the packet being assembled; fixed once its first byte lands.
    active: Option<PacketFraming>,
    /// Framing forced by a queued marker for the next packet.
    forced: Option<PacketFraming>,
    config: Arc<ConfigurationStore>,
    stats: Arc<PointerStats>,
}

impl PacketDecoder {
    pub fn new(config: Arc<ConfigurationStore>, stats: Arc<PointerStats>) -> Self {
        Self {
            assembly: [0; 4],
            cursor: 0,
            active: None,
            forced: None,
            config,
            stats,
        }
    }

    /// Buttons and axes this decoder can emit.
    pub fn capabilities() -> CapabilitySet {
        CapabilitySet::new()
            .with_keys([
                codes::BTN_LEFT,
                codes::BTN_RIGHT,
                codes::BTN_MIDDLE,
                codes::BTN_SIDE,
                codes::BTN_EXTRA,
            ])
            .with_relative([codes::REL_X, codes::REL_Y, codes::REL_WHEEL])
    }

    /// Bytes staged for the packet in flight.
    pub fn pending_bytes(&self) -> usize {
        self.cursor
    }

    fn push_byte(&mut self, byte: u8, sink: &mut dyn EventSink) {
        let framing = match self.active {
            Some(framing) => framing,
            None => {
                let framing = self
                    .forced
                    .take()
                    .unwrap_or_else(|| self.config.packet_framing());
                self.active = Some(framing);
                framing
            }
        };

        self.assembly[self.cursor] = byte;
        self.cursor += 1;

        let len = framing.packet_len();
        if self.cursor >= len {
            let bytes = self.assembly;
            self.cursor = 0;
            self.active = None;
            self.complete_packet(&bytes[..len], framing, sink);
        }
    }

    fn force_framing(&mut self, framing: PacketFraming) {
        if self.cursor != 0 {
            debug!(
                discarded = self.cursor,
                "framing marker mid-packet, dropping partial packet"
            );
            self.cursor = 0;
            self.active = None;
        }
        self.forced = Some(framing);
    }

    fn complete_packet(&mut self, bytes: &[u8], framing: PacketFraming, sink: &mut dyn EventSink) {
        let Some(packet) = parse_packet(bytes, framing, self.config.dpi_percent()) else {
            self.stats.inc_invalid();
            debug!(status = bytes[0], "packet rejected, framing marker bit clear");
            return;
        };

        if packet.x_overflow {
            debug!("pointer X overflow");
        }
        if packet.y_overflow {
            debug!("pointer Y overflow");
        }

        self.stats.inc_packet();
        self.stats.record_clicks(packet.buttons);
        if packet.scroll != 0 {
            self.stats.inc_scroll();
        }
        self.stats.record_motion(packet.dx, packet.dy);

        trace!(
            left = packet.buttons.left,
            right = packet.buttons.right,
            middle = packet.buttons.middle,
            side = packet.buttons.side,
            forward = packet.buttons.forward,
            dx = packet.dx,
            dy = packet.dy,
            scroll = packet.scroll,
            "pointer packet decoded"
        );

        emit_packet(&packet, framing, sink);
    }
}

/// Writes one packet as a frame: button levels, non-zero axes, sync.
fn emit_packet(packet: &PointerPacket, framing: PacketFraming, sink: &mut dyn EventSink) {
    let dev = DeviceClass::Pointer;
    let b = packet.buttons;

    sink.emit(NormalizedEvent::key(dev, codes::BTN_LEFT, b.left));
    sink.emit(NormalizedEvent::key(dev, codes::BTN_RIGHT, b.right));
    sink.emit(NormalizedEvent::key(dev, codes::BTN_MIDDLE, b.middle));
    if framing == PacketFraming::IntelliMouse {
        sink.emit(NormalizedEvent::key(dev, codes::BTN_SIDE, b.side));
        sink.emit(NormalizedEvent::key(dev, codes::BTN_EXTRA, b.forward));
    }

    if packet.dx != 0 {
        sink.emit(NormalizedEvent::relative(dev, codes::REL_X, packet.dx));
    }
    if packet.dy != 0 {
        sink.emit(NormalizedEvent::relative(dev, codes::REL_Y, packet.dy));
    }
    if packet.scroll != 0 {
        sink.emit(NormalizedEvent::relative(dev, codes::REL_WHEEL, packet.scroll));
    }

    sink.emit(NormalizedEvent::sync(dev));
}

impl Decoder for PacketDecoder {
    type Unit = PointerUnit;

    fn feed(&mut self, unit: PointerUnit, sink: &mut dyn EventSink) {
        match unit {
            PointerUnit::Byte(byte) => self.push_byte(byte, sink),
            PointerUnit::Frame(framing) => self.force_framing(framing),
        }
    }

    fn reset(&mut self) {
        self.assembly = [0; 4];
        self.cursor = 0;
        self.active = None;
        self.forced = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn decoder(framing: PacketFraming) -> (PacketDecoder, Arc<ConfigurationStore>, Arc<PointerStats>) {
        let config = Arc::new(ConfigurationStore::new());
        config.set_packet_framing(framing);
        let stats = Arc::new(PointerStats::default());
        let dec = PacketDecoder::new(Arc::clone(&config), Arc::clone(&stats));
        (dec, config, stats)
    }

    fn feed_bytes(dec: &mut PacketDecoder, bytes: &[u8], sink: &mut Vec<NormalizedEvent>) {
        for &b in bytes {
            dec.feed(PointerUnit::Byte(b), sink);
        }
    }

    fn relative(events: &[NormalizedEvent], axis: u16) -> Option<i32> {
        events
            .iter()
            .find(|e| e.kind == EventKind::RelativeAxis && e.code == axis)
            .map(|e| e.value)
    }

    fn pressed_buttons(events: &[NormalizedEvent]) -> Vec<u16> {
        events
            .iter()
            .filter(|e| e.kind == EventKind::Key && e.value == 1)
            .map(|e| e.code)
            .collect()
    }

    #[test]
    fn test_standard_packet_yields_motion_with_inverted_y() {
        // Arrange
        let (mut dec, _, stats) = decoder(PacketFraming::Standard);
        let mut sink = Vec::new();

        // Act
        feed_bytes(&mut dec, &[0x08, 10, 20], &mut sink);

        // Assert
        assert_eq!(relative(&sink, codes::REL_X), Some(10));
        assert_eq!(relative(&sink, codes::REL_Y), Some(-20));
        assert_eq!(relative(&sink, codes::REL_WHEEL), None);
        assert!(pressed_buttons(&sink).is_empty());
        assert!(sink.last().is_some_and(NormalizedEvent::is_sync));
        assert_eq!(stats.snapshot().packets, 1);
    }

    #[test]
    fn test_button_levels_are_reported_every_packet() {
        let (mut dec, _, _) = decoder(PacketFraming::Standard);
        let mut sink = Vec::new();

        feed_bytes(&mut dec, &[0x08, 0, 0], &mut sink);
        feed_bytes(&mut dec, &[0x08, 0, 0], &mut sink);

        let key_events = sink.iter().filter(|e| e.kind == EventKind::Key).count();
        assert_eq!(key_events, 6);
        assert_eq!(sink.iter().filter(|e| e.is_sync()).count(), 2);
    }

    #[test]
    fn test_missing_marker_rejects_whole_packet() {
        // Arrange
        let (mut dec, _, stats) = decoder(PacketFraming::Standard);
        let mut sink = Vec::new();

        // Act
        feed_bytes(&mut dec, &[0x00, 10, 20], &mut sink);

        // Assert
        assert!(sink.is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.invalid_packets, 1);
        assert_eq!(snap.packets, 0);
        assert_eq!(dec.pending_bytes(), 0);
    }

    #[test]
    fn test_dpi_scaling_truncates() {
        assert_eq!(scale_displacement(10, 50), 5);
        assert_eq!(scale_displacement(3, 50), 1);
        assert_eq!(scale_displacement(-3, 50), -1);
        assert_eq!(scale_displacement(-128, 1000), -1280);
        assert_eq!(scale_displacement(127, 10), 12);
    }

    #[test]
    fn test_dpi_change_applies_to_next_packet() {
        let (mut dec, config, _) = decoder(PacketFraming::Standard);
        let mut sink = Vec::new();
        config.set_dpi_percent(50).unwrap();

        feed_bytes(&mut dec, &[0x08, 10, 0], &mut sink);

        assert_eq!(relative(&sink, codes::REL_X), Some(5));
    }

    #[test]
    fn test_intellimouse_packet_decodes_scroll_and_extra_buttons() {
        // Arrange
        let (mut dec, _, stats) = decoder(PacketFraming::IntelliMouse);
        let mut sink = Vec::new();

        // Act: wheel nibble 0xF = -1, side + forward set.
        feed_bytes(&mut dec, &[0x09, 0, 0, 0x3F], &mut sink);

        // Assert
        assert_eq!(relative(&sink, codes::REL_WHEEL), Some(-1));
        assert_eq!(
            pressed_buttons(&sink),
            vec![codes::BTN_LEFT, codes::BTN_SIDE, codes::BTN_EXTRA]
        );
        let snap = stats.snapshot();
        assert_eq!(snap.total_clicks, 3);
        assert_eq!(snap.side_clicks, 1);
        assert_eq!(snap.forward_clicks, 1);
        assert_eq!(snap.scroll_events, 1);
    }

    #[test]
    fn test_wheel_nibble_sign_extension() {
        assert_eq!(wheel_delta(0x01), 1);
        assert_eq!(wheel_delta(0x07), 7);
        assert_eq!(wheel_delta(0x08), -8);
        assert_eq!(wheel_delta(0x0E), -2);
        assert_eq!(wheel_delta(0xF0), 0);
    }

    #[test]
    fn test_multiple_buttons_count_in_one_packet() {
        let (mut dec, _, stats) = decoder(PacketFraming::Standard);
        let mut sink = Vec::new();

        feed_bytes(&mut dec, &[0x0F, 0, 0], &mut sink);

        let snap = stats.snapshot();
        assert_eq!(snap.total_clicks, 3);
        assert_eq!(
            (snap.left_clicks, snap.right_clicks, snap.middle_clicks),
            (1, 1, 1)
        );
    }

    #[test]
    fn test_framing_switch_waits_for_packet_boundary() {
        // Arrange
        let (mut dec, config, stats) = decoder(PacketFraming::IntelliMouse);
        let mut sink = Vec::new();

        // Act: two bytes of a 4-byte packet, then switch to 3-byte framing.
        feed_bytes(&mut dec, &[0x08, 1], &mut sink);
        config.set_packet_framing(PacketFraming::Standard);
        feed_bytes(&mut dec, &[2], &mut sink);
        let after_three = stats.snapshot().packets;
        feed_bytes(&mut dec, &[0x00], &mut sink);

        // Assert: the in-flight packet completed as 4 bytes.
        assert_eq!(after_three, 0);
        assert_eq!(stats.snapshot().packets, 1);

        // The next packet uses the new 3-byte framing.
        feed_bytes(&mut dec, &[0x08, 4, 4], &mut sink);
        assert_eq!(stats.snapshot().packets, 2);
    }

    #[test]
    fn test_frame_marker_forces_short_packet_once() {
        let (mut dec, _, stats) = decoder(PacketFraming::IntelliMouse);
        let mut sink = Vec::new();

        dec.feed(PointerUnit::Frame(PacketFraming::Standard), &mut sink);
        feed_bytes(&mut dec, &[0x08, 5, 5], &mut sink);
        assert_eq!(stats.snapshot().packets, 1);

        feed_bytes(&mut dec, &[0x08, 5, 5], &mut sink);
        assert_eq!(stats.snapshot().packets, 1);
        assert_eq!(dec.pending_bytes(), 3);
    }

    #[test]
    fn test_frame_marker_mid_packet_discards_partial_bytes() {
        let (mut dec, _, stats) = decoder(PacketFraming::IntelliMouse);
        let mut sink = Vec::new();

        feed_bytes(&mut dec, &[0x08, 1], &mut sink);
        dec.feed(PointerUnit::Frame(PacketFraming::Standard), &mut sink);
        feed_bytes(&mut dec, &[0x08, 7, 0], &mut sink);

        assert_eq!(stats.snapshot().packets, 1);
        assert_eq!(relative(&sink, codes::REL_X), Some(7));
    }

    #[test]
    fn test_motion_statistics_accumulate() {
        let (mut dec, _, stats) = decoder(PacketFraming::Standard);
        let mut sink = Vec::new();

        feed_bytes(&mut dec, &[0x08, 10, 20], &mut sink);
        feed_bytes(&mut dec, &[0x08, 0xFB, 0], &mut sink); // dx = -5

        let snap = stats.snapshot();
        assert_eq!(snap.total_dx, 5);
        assert_eq!(snap.total_dy, -20);
        assert_eq!(snap.total_distance, 35);
    }

    #[test]
    fn test_reset_drops_partial_packet() {
        let (mut dec, _, _) = decoder(PacketFraming::Standard);
        let mut sink = Vec::new();
        feed_bytes(&mut dec, &[0x08, 1], &mut sink);

        Decoder::reset(&mut dec);

        assert_eq!(dec.pending_bytes(), 0);
    }

    #[test]
    fn test_emitted_codes_stay_within_capabilities() {
        let (mut dec, _, _) = decoder(PacketFraming::IntelliMouse);
        let caps = PacketDecoder::capabilities();
        let mut sink = Vec::new();

        feed_bytes(&mut dec, &[0xFF, 0x80, 0x7F, 0xFF], &mut sink);

        assert!(!sink.is_empty());
        assert!(sink.iter().all(|e| caps.permits(e.kind, e.code)));
    }
}
