#![forbid(unsafe_code)]

//! Canonical input messages.
//!
//! Everything the input layer hands to an application is an [`InputMsg`].
//! The set is closed: key presses, the two capability reports, and a
//! pass-through variant for sequences nobody recognized.
//!
//! # Design Notes
//!
//! - `KeyMod` bits follow the xterm modifier encoding minus one, so the wire
//!   value `1` means "no modifiers".
//! - Unknown modifier bits are retained rather than truncated.
//! - `KeyPress::text` is only filled for unmodified or shift-only keys.

use std::fmt;

use bitflags::bitflags;

use crate::sequence::Sequence;

bitflags! {
    /// Modifier keys held during a key press.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyMod: u32 {
        /// Shift key.
        const SHIFT       = 1 << 0;
        /// Alt/Option key.
        const ALT         = 1 << 1;
        /// Control key.
        const CTRL        = 1 << 2;
        /// Meta key.
        const META        = 1 << 3;
        /// Hyper key.
        const HYPER       = 1 << 4;
        /// Super/Command key.
        const SUPER       = 1 << 5;
        /// Caps Lock active.
        const CAPS_LOCK   = 1 << 6;
        /// Num Lock active.
        const NUM_LOCK    = 1 << 7;
        /// Scroll Lock active.
        const SCROLL_LOCK = 1 << 8;
    }
}

impl KeyMod {
    /// Decode a 1-based wire modifier parameter.
    ///
    /// `0` (absent or malformed) and `1` both decode to no modifiers.
    #[must_use]
    pub const fn from_wire(value: u32) -> Self {
        Self::from_bits_retain(value.saturating_sub(1))
    }

    /// Encode back to the 1-based wire value.
    #[must_use]
    pub const fn to_wire(self) -> u32 {
        self.bits().saturating_add(1)
    }

    /// True when nothing beyond Shift is held.
    ///
    /// Key presses in this state carry literal text.
    #[must_use]
    pub const fn is_text_compatible(self) -> bool {
        self.bits() <= Self::SHIFT.bits()
    }
}

/// Key codes for key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A character key, reported by code point.
    Char(char),

    /// Enter/Return key.
    Enter,

    /// Tab key.
    Tab,

    /// Backspace key.
    Backspace,

    /// Escape key.
    Escape,
}

impl KeyCode {
    /// Name used in key-binding strings.
    fn write_name(self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(' ') => f.write_str("space"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Enter => f.write_str("enter"),
            Self::Tab => f.write_str("tab"),
            Self::Backspace => f.write_str("backspace"),
            Self::Escape => f.write_str("esc"),
        }
    }
}

/// A decoded key press.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPress {
    /// Modifier keys held during the press.
    pub modifiers: KeyMod,

    /// The key that was pressed.
    pub code: KeyCode,

    /// Literal text produced by the key, empty for modified keys.
    pub text: String,
}

impl KeyPress {
    /// Create an unmodified key press without text.
    #[must_use]
    pub fn new(code: KeyCode) -> Self {
        Self {
            modifiers: KeyMod::empty(),
            code,
            text: String::new(),
        }
    }

    /// Create a key press for a character, applying the text policy.
    #[must_use]
    pub fn char(c: char, modifiers: KeyMod) -> Self {
        let text = if modifiers.is_text_compatible() {
            c.to_string()
        } else {
            String::new()
        };
        Self {
            modifiers,
            code: KeyCode::Char(c),
            text,
        }
    }

    /// Set the modifiers.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: KeyMod) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// Check if Ctrl modifier is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(KeyMod::CTRL)
    }

    /// Check if Alt modifier is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(KeyMod::ALT)
    }

    /// Check if Shift modifier is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(KeyMod::SHIFT)
    }
}

/// Renders as a key-binding string, e.g. `ctrl+shift+a` or `enter`.
impl fmt::Display for KeyPress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(KeyMod, &str); 6] = [
            (KeyMod::CTRL, "ctrl"),
            (KeyMod::ALT, "alt"),
            (KeyMod::SHIFT, "shift"),
            (KeyMod::META, "meta"),
            (KeyMod::HYPER, "hyper"),
            (KeyMod::SUPER, "super"),
        ];
        // Shifted printable characters already read as themselves.
        let shifted_text = !self.text.is_empty() && self.modifiers == KeyMod::SHIFT;
        for (flag, name) in NAMES {
            if self.modifiers.contains(flag) && !(flag == KeyMod::SHIFT && shifted_text) {
                write!(f, "{name}+")?;
            }
        }
        self.code.write_name(f)
    }
}

/// The terminal's `modifyOtherKeys` reporting mode.
///
/// Used both as an outbound intent and as an inbound report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReportingMode {
    /// Keys are reported the legacy way.
    #[default]
    Disabled,

    /// Mode 1: ambiguous keys are reported as escape sequences.
    Ambiguous,

    /// Mode 2: all modified keys, including Alt and Meta combinations.
    Extended,
}

impl ReportingMode {
    /// Map a wire value to a mode. Values outside 0..=2 are unknown.
    #[must_use]
    pub const fn from_param(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Ambiguous),
            2 => Some(Self::Extended),
            _ => None,
        }
    }

    /// The wire value of this mode.
    #[must_use]
    pub const fn as_param(self) -> u32 {
        match self {
            Self::Disabled => 0,
            Self::Ambiguous => 1,
            Self::Extended => 2,
        }
    }

    /// True for modes 1 and 2.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Message produced by the input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMsg {
    /// A key was pressed.
    KeyPress(KeyPress),

    /// The terminal reported its current reporting mode.
    ReportingMode(ReportingMode),

    /// The terminal reported its name and version (XTVERSION).
    TerminalVersion(String),

    /// A sequence that no decoder claimed, passed through untouched.
    Unrecognized(Sequence),
}

impl InputMsg {
    /// True for the capability report variants.
    #[must_use]
    pub const fn is_report(&self) -> bool {
        matches!(self, Self::ReportingMode(_) | Self::TerminalVersion(_))
    }

    /// Stable variant name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KeyPress(_) => "key_press",
            Self::ReportingMode(_) => "reporting_mode",
            Self::TerminalVersion(_) => "terminal_version",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

impl From<KeyPress> for InputMsg {
    fn from(key: KeyPress) -> Self {
        Self::KeyPress(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_wire_subtracts_offset() {
        assert_eq!(KeyMod::from_wire(1), KeyMod::empty());
        assert_eq!(KeyMod::from_wire(2), KeyMod::SHIFT);
        assert_eq!(KeyMod::from_wire(5), KeyMod::CTRL);
        assert_eq!(KeyMod::from_wire(6), KeyMod::CTRL | KeyMod::SHIFT);
    }

    #[test]
    fn from_wire_zero_is_empty() {
        assert_eq!(KeyMod::from_wire(0), KeyMod::empty());
    }

    #[test]
    fn from_wire_retains_unknown_bits() {
        let mods = KeyMod::from_wire((1 << 12) | 1);
        assert_eq!(mods.bits(), 1 << 12);
        assert_eq!(mods.to_wire(), (1 << 12) + 1);
    }

    #[test]
    fn text_compatibility_threshold() {
        assert!(KeyMod::empty().is_text_compatible());
        assert!(KeyMod::SHIFT.is_text_compatible());
        assert!(!KeyMod::ALT.is_text_compatible());
        assert!(!KeyMod::CAPS_LOCK.is_text_compatible());
    }

    #[test]
    fn char_constructor_applies_text_policy() {
        assert_eq!(KeyPress::char('a', KeyMod::empty()).text, "a");
        assert_eq!(KeyPress::char('A', KeyMod::SHIFT).text, "A");
        assert!(KeyPress::char('a', KeyMod::CTRL).text.is_empty());
    }

    #[test]
    fn key_press_helpers() {
        let key = KeyPress::char('c', KeyMod::CTRL);
        assert!(key.is_char('c'));
        assert!(key.ctrl());
        assert!(!key.alt());
        assert!(!key.shift());
    }

    #[test]
    fn display_binding_strings() {
        assert_eq!(KeyPress::char('c', KeyMod::CTRL).to_string(), "ctrl+c");
        assert_eq!(KeyPress::new(KeyCode::Enter).to_string(), "enter");
        assert_eq!(
            KeyPress::char('a', KeyMod::CTRL | KeyMod::SHIFT).to_string(),
            "ctrl+shift+a"
        );
        assert_eq!(KeyPress::char('A', KeyMod::SHIFT).to_string(), "A");
        assert_eq!(
            KeyPress::new(KeyCode::Tab)
                .with_modifiers(KeyMod::SHIFT)
                .to_string(),
            "shift+tab"
        );
        assert_eq!(KeyPress::char(' ', KeyMod::empty()).to_string(), "space");
        assert_eq!(KeyPress::new(KeyCode::Escape).with_modifiers(KeyMod::ALT).to_string(), "alt+esc");
    }

    #[test]
    fn reporting_mode_params() {
        for mode in [
            ReportingMode::Disabled,
            ReportingMode::Ambiguous,
            ReportingMode::Extended,
        ] {
            assert_eq!(ReportingMode::from_param(mode.as_param()), Some(mode));
        }
        assert_eq!(ReportingMode::from_param(3), None);
        assert!(!ReportingMode::Disabled.is_enabled());
        assert!(ReportingMode::Extended.is_enabled());
    }

    #[test]
    fn reporting_mode_default_is_disabled() {
        assert_eq!(ReportingMode::default(), ReportingMode::Disabled);
    }

    #[test]
    fn report_variants_are_flagged() {
        assert!(InputMsg::ReportingMode(ReportingMode::Ambiguous).is_report());
        assert!(InputMsg::TerminalVersion("XTerm(380)".into()).is_report());
        assert!(!InputMsg::KeyPress(KeyPress::new(KeyCode::Enter)).is_report());
        assert_eq!(InputMsg::TerminalVersion(String::new()).kind(), "terminal_version");
    }
}
