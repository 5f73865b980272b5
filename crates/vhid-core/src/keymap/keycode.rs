//! Logical key codes delivered to the downstream sink.
//!
//! The numeric value of each variant is its Linux input-event-codes `KEY_*`
//! value, so the sink can hand the code to an evdev consumer unchanged.
//!
//! # Scan code vs. key code (for beginners)
//!
//! A keyboard does not send letters.  It sends *scan codes*: small numbers that
//! identify a physical key position plus whether it went down or up.  The
//! operating system translates each scan code into a *key code*, a stable
//! identifier such as "the A key" that higher layers understand.  This module
//! defines the key-code side of that translation; the table that maps one to
//! the other lives in [`super::scancode`].

use serde::{Deserialize, Serialize};

/// Linux `KEY_*` code for every key reachable from the scan-code table.
///
/// [`KeyCode::Reserved`] (value 0) marks table slots with no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum KeyCode {
    Reserved = 0,
    Esc = 1,
    Num1 = 2,
    Num2 = 3,
    Num3 = 4,
    Num4 = 5,
    Num5 = 6,
    Num6 = 7,
    Num7 = 8,
    Num8 = 9,
    Num9 = 10,
    Num0 = 11,
    Minus = 12,
    Equal = 13,
    Backspace = 14,
    Tab = 15,
    Q = 16,
    W = 17,
    E = 18,
    R = 19,
    T = 20,
    Y = 21,
    U = 22,
    I = 23,
    O = 24,
    P = 25,
    LeftBrace = 26,
    RightBrace = 27,
    Enter = 28,
    LeftCtrl = 29,
    A = 30,
    S = 31,
    D = 32,
    F = 33,
    G = 34,
    H = 35,
    J = 36,
    K = 37,
    L = 38,
    Semicolon = 39,
    Apostrophe = 40,
    Grave = 41,
    LeftShift = 42,
    Backslash = 43,
    Z = 44,
    X = 45,
    C = 46,
    V = 47,
    B = 48,
    N = 49,
    M = 50,
    Comma = 51,
    Dot = 52,
    Slash = 53,
    RightShift = 54,
    KpAsterisk = 55,
    LeftAlt = 56,
    Space = 57,
    CapsLock = 58,
    F1 = 59,
    F2 = 60,
    F3 = 61,
    F4 = 62,
    F5 = 63,
    F6 = 64,
    F7 = 65,
    F8 = 66,
    F9 = 67,
    F10 = 68,
    NumLock = 69,
    ScrollLock = 70,
    Kp7 = 71,
    Kp8 = 72,
    Kp9 = 73,
    KpMinus = 74,
    Kp4 = 75,
    Kp5 = 76,
    Kp6 = 77,
    KpPlus = 78,
    Kp1 = 79,
    Kp2 = 80,
    Kp3 = 81,
    Kp0 = 82,
    KpDot = 83,
    Key102nd = 86,
    F11 = 87,
    F12 = 88,
    KpEnter = 96,
    RightCtrl = 97,
    RightAlt = 100,
    Home = 102,
    Up = 103,
    PageUp = 104,
    Left = 105,
    Right = 106,
    End = 107,
    Down = 108,
    PageDown = 109,
    Insert = 110,
    Delete = 111,
    Mute = 113,
    VolumeDown = 114,
    VolumeUp = 115,
    Power = 116,
    LeftMeta = 125,
    RightMeta = 126,
    Compose = 127,
    Calc = 140,
    Sleep = 142,
    WakeUp = 143,
    Mail = 155,
    Bookmarks = 156,
    Computer = 157,
    NextSong = 163,
    PlayPause = 164,
    PreviousSong = 165,
    StopCd = 166,
    HomePage = 172,
    Search = 217,
}

impl KeyCode {
    /// Returns the raw Linux key code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` for the table's "no mapping" sentinel.
    pub fn is_reserved(self) -> bool {
        self == KeyCode::Reserved
    }

    /// Returns `true` for left or right Shift.
    pub fn is_shift(self) -> bool {
        matches!(self, KeyCode::LeftShift | KeyCode::RightShift)
    }

    /// Returns `true` for left or right Ctrl.
    pub fn is_ctrl(self) -> bool {
        matches!(self, KeyCode::LeftCtrl | KeyCode::RightCtrl)
    }

    /// Returns `true` for left or right Alt.
    pub fn is_alt(self) -> bool {
        matches!(self, KeyCode::LeftAlt | KeyCode::RightAlt)
    }

    /// Returns `true` for Caps Lock, Num Lock or Scroll Lock.
    pub fn is_lock(self) -> bool {
        matches!(
            self,
            KeyCode::CapsLock | KeyCode::NumLock | KeyCode::ScrollLock
        )
    }
}
