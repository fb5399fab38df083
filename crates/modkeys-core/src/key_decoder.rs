#![forbid(unsafe_code)]

//! Key event decoding.
//!
//! Two sources of key presses:
//!
//! - [`decode_extended_key`] handles the xterm `modifyOtherKeys` report
//!   `CSI 27 ; <modifiers + 1> ; <code point> ~`, which terminals emit once
//!   a reporting mode is enabled.
//! - [`decode_control`], [`decode_char`] and [`decode_alt`] map the legacy
//!   encodings produced by the tokenizer (C0 bytes, plain characters,
//!   ESC-prefixed bytes).
//!
//! # Design Notes
//!
//! All functions are total. Input that does not match yields `None` and is
//! passed through by the caller, never an error.
//!
//! Code point 127 (DEL) decodes to Backspace, same as code point 8 (BS).
//! Terminals disagree on which of the two the Backspace key sends, so both
//! land on the same symbolic key.

use crate::event::{KeyCode, KeyMod, KeyPress};
use crate::sequence::ControlSequence;

/// Leading parameter of an extended key report.
const EXTENDED_KEY_MARKER: u32 = 27;

const BS: u32 = 0x08;
const HT: u32 = 0x09;
const CR: u32 = 0x0D;
const ESC: u32 = 0x1B;
const DEL: u32 = 0x7F;

/// Map a code point to the symbolic key it names, if any.
fn symbolic_key(code: u32) -> Option<KeyCode> {
    match code {
        BS | DEL => Some(KeyCode::Backspace),
        HT => Some(KeyCode::Tab),
        CR => Some(KeyCode::Enter),
        ESC => Some(KeyCode::Escape),
        _ => None,
    }
}

/// Decode an extended key report.
///
/// Recognizes `CSI 27 ; m ; c ~` with no private marker and no
/// intermediates. The modifier set is exactly `m - 1` (an absent `m` means
/// none). Code points 8, 9, 13, 27 and 127 become symbolic keys; any other
/// valid Unicode scalar becomes [`KeyCode::Char`], with `text` filled only
/// when at most Shift is held.
///
/// Returns `None` when the sequence has a different shape, lacks the code
/// point, or carries a code point that is not a Unicode scalar value.
#[must_use]
pub fn decode_extended_key(seq: &ControlSequence) -> Option<KeyPress> {
    if !seq.is_plain(b'~') || seq.param(1, 0) != EXTENDED_KEY_MARKER || !seq.has_param(3) {
        return None;
    }

    let modifiers = KeyMod::from_wire(seq.param(2, 1));
    let code = seq.param(3, 0);

    if let Some(key) = symbolic_key(code) {
        return Some(KeyPress::new(key).with_modifiers(modifiers));
    }

    char::from_u32(code).map(|c| KeyPress::char(c, modifiers))
}

/// Decode a C0 control byte or DEL as received in the legacy encoding.
#[must_use]
pub fn decode_control(byte: u8) -> KeyPress {
    match byte {
        0x00 => KeyPress::new(KeyCode::Char(' ')).with_modifiers(KeyMod::CTRL),
        0x08 | 0x7F => KeyPress::new(KeyCode::Backspace),
        0x09 => KeyPress::new(KeyCode::Tab),
        0x0D => KeyPress::new(KeyCode::Enter),
        0x1B => KeyPress::new(KeyCode::Escape),
        // Ctrl+A..Ctrl+Z.
        0x01..=0x1A => ctrl_char(char::from(byte + b'a' - 1)),
        // Ctrl+\ Ctrl+] Ctrl+^ Ctrl+_ and anything else in range.
        _ => ctrl_char(char::from((byte & 0x1F) + 0x40)),
    }
}

fn ctrl_char(c: char) -> KeyPress {
    KeyPress::new(KeyCode::Char(c)).with_modifiers(KeyMod::CTRL)
}

/// Decode a plain printable character.
#[must_use]
pub fn decode_char(c: char) -> KeyPress {
    KeyPress::char(c, KeyMod::empty())
}

/// Decode an ESC-prefixed ASCII byte as an Alt chord.
#[must_use]
pub fn decode_alt(byte: u8) -> KeyPress {
    let mut key = match byte {
        0x20..=0x7E => KeyPress::new(KeyCode::Char(char::from(byte))),
        _ => decode_control(byte),
    };
    key.modifiers |= KeyMod::ALT;
    key
}
