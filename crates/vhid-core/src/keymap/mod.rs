//! Keyboard scan-code translation.
//!
//! Raw bytes arrive as PS/2 set-1 scan codes; the decoder turns them into
//! Linux key codes through a fixed table built at compile time.

pub mod keycode;
pub mod scancode;

pub use keycode::KeyCode;
pub use scancode::{split_scancode, ScancodeTable, RELEASE_FLAG};
