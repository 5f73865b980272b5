//! PS/2 scan-code set 1 to [`KeyCode`] translation table.
//!
//! # How the table works (for beginners)
//!
//! `SCANCODE_TABLE` is a compile-time constant array of 128 [`KeyCode`] values
//! indexed by the low 7 bits of a scan code.  Position 0x1E holds
//! [`KeyCode::A`] because the A key sends make code 0x1E.  Slots without a key
//! store [`KeyCode::Reserved`].
//!
//! The high bit of a set-1 scan code is the *break* flag: 0x1E is "A pressed",
//! 0x9E (0x1E | 0x80) is "A released".  The caller strips that bit before the
//! lookup; see [`split_scancode`].

use super::keycode::KeyCode;

/// Number of entries in the table; every 7-bit value has a slot.
pub const TABLE_SIZE: usize = 128;

/// High bit of a set-1 scan code, set on key release.
pub const RELEASE_FLAG: u8 = 0x80;

/// Splits a raw byte into its 7-bit table index and the release flag.
pub fn split_scancode(byte: u8) -> (u8, bool) {
    (byte & !RELEASE_FLAG, byte & RELEASE_FLAG != 0)
}

/// Immutable scan-code to key-code mapping.
#[derive(Debug, Clone, Copy)]
pub struct ScancodeTable {
    entries: &'static [KeyCode; TABLE_SIZE],
}

impl Default for ScancodeTable {
    fn default() -> Self {
        Self::set1()
    }
}

impl ScancodeTable {
    /// The PS/2 set-1 table.
    pub const fn set1() -> Self {
        Self {
            entries: &SCANCODE_TABLE,
        }
    }

    /// Looks up a 7-bit index.
    ///
    /// Returns `None` when the index is out of range or the slot is unmapped.
    pub fn lookup(&self, index: u8) -> Option<KeyCode> {
        match self.entries.get(usize::from(index)) {
            Some(code) if !code.is_reserved() => Some(*code),
            _ => None,
        }
    }

    /// Every mapped key code, in table order.  Used to build the keyboard's
    /// declared capability set.
    pub fn mapped_codes(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.entries.iter().copied().filter(|c| !c.is_reserved())
    }
}

const SCANCODE_TABLE: [KeyCode; TABLE_SIZE] = {
    use KeyCode::*;
    let mut t = [Reserved; TABLE_SIZE];

    // ── Main block (0x01–0x39) ───────────────────────────────────────────────
    t[0x01] = Esc;
    t[0x02] = Num1;
    t[0x03] = Num2;
    t[0x04] = Num3;
    t[0x05] = Num4;
    t[0x06] = Num5;
    t[0x07] = Num6;
    t[0x08] = Num7;
    t[0x09] = Num8;
    t[0x0A] = Num9;
    t[0x0B] = Num0;
    t[0x0C] = Minus;
    t[0x0D] = Equal;
    t[0x0E] = Backspace;
    t[0x0F] = Tab;
    t[0x10] = Q;
    t[0x11] = W;
    t[0x12] = E;
    t[0x13] = R;
    t[0x14] = T;
    t[0x15] = Y;
    t[0x16] = U;
    t[0x17] = I;
    t[0x18] = O;
    t[0x19] = P;
    t[0x1A] = LeftBrace;
    t[0x1B] = RightBrace;
    t[0x1C] = Enter;
    t[0x1D] = LeftCtrl;
    t[0x1E] = A;
    t[0x1F] = S;
    t[0x20] = D;
    t[0x21] = F;
    t[0x22] = G;
    t[0x23] = H;
    t[0x24] = J;
    t[0x25] = K;
    t[0x26] = L;
    t[0x27] = Semicolon;
    t[0x28] = Apostrophe;
    t[0x29] = Grave;
    t[0x2A] = LeftShift;
    t[0x2B] = Backslash;
    t[0x2C] = Z;
    t[0x2D] = X;
    t[0x2E] = C;
    t[0x2F] = V;
    t[0x30] = B;
    t[0x31] = N;
    t[0x32] = M;
    t[0x33] = Comma;
    t[0x34] = Dot;
    t[0x35] = Slash;
    t[0x36] = RightShift;
    t[0x37] = KpAsterisk;
    t[0x38] = LeftAlt;
    t[0x39] = Space;
    t[0x3A] = CapsLock;

    // ── Function keys and locks ──────────────────────────────────────────────
    t[0x3B] = F1;
    t[0x3C] = F2;
    t[0x3D] = F3;
    t[0x3E] = F4;
    t[0x3F] = F5;
    t[0x40] = F6;
    t[0x41] = F7;
    t[0x42] = F8;
    t[0x43] = F9;
    t[0x44] = F10;
    t[0x45] = NumLock;
    t[0x46] = ScrollLock;

    // ── Numeric keypad ───────────────────────────────────────────────────────
    t[0x47] = Kp7;
    t[0x48] = Kp8;
    t[0x49] = Kp9;
    t[0x4A] = KpMinus;
    t[0x4B] = Kp4;
    t[0x4C] = Kp5;
    t[0x4D] = Kp6;
    t[0x4E] = KpPlus;
    t[0x4F] = Kp1;
    t[0x50] = Kp2;
    t[0x51] = Kp3;
    t[0x52] = Kp0;
    t[0x53] = KpDot;

    t[0x56] = Key102nd;
    t[0x57] = F11;
    t[0x58] = F12;

    // ── Meta, menu and system keys ───────────────────────────────────────────
    t[0x5B] = LeftMeta;
    t[0x5C] = RightMeta;
    t[0x5D] = Compose;
    t[0x5E] = Power;
    t[0x5F] = Sleep;
    t[0x63] = WakeUp;
    t[0x65] = Search;
    t[0x66] = Bookmarks;

    // ── Navigation cluster ───────────────────────────────────────────────────
    t[0x67] = Up;
    t[0x68] = PageUp;
    t[0x69] = Left;
    t[0x6A] = Right;
    t[0x6B] = End;
    t[0x6C] = Down;
    t[0x6D] = PageDown;
    t[0x6E] = Insert;
    t[0x6F] = Delete;

    // ── Multimedia ───────────────────────────────────────────────────────────
    t[0x71] = Mute;
    t[0x72] = VolumeDown;
    t[0x73] = VolumeUp;
    t[0x74] = PlayPause;
    t[0x75] = StopCd;
    t[0x76] = PreviousSong;
    t[0x77] = NextSong;
    t[0x78] = HomePage;
    t[0x79] = Mail;
    t[0x7A] = Calc;
    t[0x7B] = Computer;

    // ── Right-hand duplicates ────────────────────────────────────────────────
    t[0x7C] = KpEnter;
    t[0x7D] = RightCtrl;
    t[0x7E] = RightAlt;
    t[0x7F] = Home;

    t
};

#[cfg(test)]
mod tests {
    use super::*;
    use KeyCode::*;

    /// Pairs of (scan code, expected key code) across every table section.
    const SAMPLE_MAPPINGS: &[(u8, KeyCode)] = &[
        (0x01, Esc), (0x02, Num1), (0x0B, Num0), (0x0E, Backspace), (0x0F, Tab),
        (0x10, Q), (0x1C, Enter), (0x1D, LeftCtrl), (0x1E, A), (0x2A, LeftShift),
        (0x2E, C), (0x2F, V), (0x2D, X), (0x2C, Z), (0x38, LeftAlt),
        (0x39, Space), (0x3A, CapsLock), (0x3B, F1), (0x3E, F4), (0x44, F10),
        (0x45, NumLock), (0x46, ScrollLock), (0x47, Kp7), (0x53, KpDot),
        (0x57, F11), (0x58, F12), (0x5B, LeftMeta), (0x67, Up), (0x6F, Delete),
        (0x71, Mute), (0x7C, KpEnter), (0x7D, RightCtrl), (0x7E, RightAlt),
        (0x7F, Home),
    ];

    #[test]
    fn test_lookup_returns_expected_key_for_sampled_codes() {
        let table = ScancodeTable::set1();

        for &(scancode, expected) in SAMPLE_MAPPINGS {
            assert_eq!(
                table.lookup(scancode),
                Some(expected),
                "scan code {scancode:#04x}"
            );
        }
    }

    #[test]
    fn test_unmapped_slots_return_none() {
        let table = ScancodeTable::set1();

        for unmapped in [0x00, 0x54, 0x55, 0x59, 0x5A, 0x60, 0x61, 0x62, 0x64, 0x70] {
            assert_eq!(table.lookup(unmapped), None, "scan code {unmapped:#04x}");
        }
    }

    #[test]
    fn test_out_of_range_index_returns_none() {
        let table = ScancodeTable::set1();

        assert_eq!(table.lookup(0x80), None);
        assert_eq!(table.lookup(0xFF), None);
    }

    #[test]
    fn test_split_scancode_separates_release_flag() {
        assert_eq!(split_scancode(0x1E), (0x1E, false));
        assert_eq!(split_scancode(0x9E), (0x1E, true));
        assert_eq!(split_scancode(0x80), (0x00, true));
    }

    #[test]
    fn test_mapped_codes_excludes_reserved_and_has_no_duplicates() {
        let table = ScancodeTable::set1();

        let codes: Vec<KeyCode> = table.mapped_codes().collect();
        let mut deduped = codes.clone();
        deduped.sort();
        deduped.dedup();

        assert!(!codes.contains(&Reserved));
        assert_eq!(codes.len(), deduped.len());
        assert_eq!(codes.len(), 118);
    }
}
