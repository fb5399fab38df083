#![forbid(unsafe_code)]

//! Structured views over tokenized escape sequences.
//!
//! The decoders in this crate never look at raw bytes. They read a
//! [`ControlSequence`] (CSI) or [`DeviceControlString`] (DCS) produced by
//! [`crate::input_parser::InputParser`], through 1-indexed parameter
//! accessors that substitute a default for anything absent or malformed.

use std::fmt;

use smallvec::SmallVec;

/// Ordered parameter list. `None` marks an empty or overflowing parameter.
pub type Params = SmallVec<[Option<u32>; 8]>;

/// Parse a semicolon-separated parameter block.
///
/// Colon sub-parameters keep only their first value. Values that overflow
/// `u32` or contain stray bytes become `None`.
pub fn parse_params(bytes: &[u8]) -> Params {
    let mut params = Params::new();
    if bytes.is_empty() {
        return params;
    }
    for field in bytes.split(|&b| b == b';') {
        let head = field.split(|&b| b == b':').next().unwrap_or(&[]);
        params.push(parse_number(head));
    }
    params
}

fn parse_number(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u32, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u32::from(b - b'0'))
    })
}

fn param_at(params: &Params, index: usize, default: u32) -> u32 {
    index
        .checked_sub(1)
        .and_then(|i| params.get(i).copied().flatten())
        .unwrap_or(default)
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &Params) -> fmt::Result {
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            f.write_str(" ;")?;
        }
        match p {
            Some(v) => write!(f, " {v}")?,
            None => f.write_str(" _")?,
        }
    }
    Ok(())
}

/// A CSI sequence: `ESC [ [marker] params [intermediates] final`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlSequence {
    /// Private marker byte (`?`, `>`, `<`, `=`), if any.
    pub marker: Option<u8>,
    /// Intermediate bytes (0x20..=0x2F) before the final byte.
    pub intermediates: SmallVec<[u8; 2]>,
    /// Final byte (0x40..=0x7E).
    pub final_byte: u8,
    params: Params,
}

impl ControlSequence {
    /// Build a sequence from already-split parts.
    #[must_use]
    pub fn new(marker: Option<u8>, params: Params, intermediates: &[u8], final_byte: u8) -> Self {
        Self {
            marker,
            intermediates: SmallVec::from_slice(intermediates),
            final_byte,
            params,
        }
    }

    /// Parameter at 1-based `index`, or `default` if absent or malformed.
    #[must_use]
    pub fn param(&self, index: usize, default: u32) -> u32 {
        param_at(&self.params, index, default)
    }

    /// True if the parameter at 1-based `index` carries a value.
    #[must_use]
    pub fn has_param(&self, index: usize) -> bool {
        index
            .checked_sub(1)
            .and_then(|i| self.params.get(i))
            .is_some_and(Option::is_some)
    }

    /// Number of parameter slots, including empty ones.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Raw parameter slots.
    #[must_use]
    pub fn params(&self) -> &[Option<u32>] {
        &self.params
    }

    /// True for a plain sequence (no marker, no intermediates) with `final_byte`.
    #[must_use]
    pub fn is_plain(&self, final_byte: u8) -> bool {
        self.marker.is_none() && self.intermediates.is_empty() && self.final_byte == final_byte
    }
}

impl fmt::Display for ControlSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CSI")?;
        if let Some(m) = self.marker {
            write!(f, " {}", char::from(m))?;
        }
        write_params(f, &self.params)?;
        for &b in &self.intermediates {
            write!(f, " {}", char::from(b))?;
        }
        write!(f, " {}", char::from(self.final_byte))
    }
}

/// A DCS string: `ESC P [marker] params [intermediates] final data ST`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceControlString {
    /// Private marker byte, if any.
    pub marker: Option<u8>,
    /// Intermediate bytes.
    pub intermediates: SmallVec<[u8; 2]>,
    /// Final byte of the DCS header.
    pub final_byte: u8,
    /// Payload between the header and the string terminator.
    pub data: Vec<u8>,
    params: Params,
}

impl DeviceControlString {
    /// Build a device control string from already-split parts.
    #[must_use]
    pub fn new(
        marker: Option<u8>,
        params: Params,
        intermediates: &[u8],
        final_byte: u8,
        data: Vec<u8>,
    ) -> Self {
        Self {
            marker,
            intermediates: SmallVec::from_slice(intermediates),
            final_byte,
            data,
            params,
        }
    }

    /// Parameter at 1-based `index`, or `default` if absent or malformed.
    #[must_use]
    pub fn param(&self, index: usize, default: u32) -> u32 {
        param_at(&self.params, index, default)
    }

    /// Payload decoded as UTF-8, replacing invalid bytes.
    #[must_use]
    pub fn data_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl fmt::Display for DeviceControlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DCS")?;
        if let Some(m) = self.marker {
            write!(f, " {}", char::from(m))?;
        }
        write_params(f, &self.params)?;
        for &b in &self.intermediates {
            write!(f, " {}", char::from(b))?;
        }
        write!(f, " {} ({} bytes) ST", char::from(self.final_byte), self.data.len())
    }
}

/// Any escape sequence the tokenizer can isolate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sequence {
    /// Control Sequence Introducer.
    Csi(ControlSequence),
    /// Device Control String.
    Dcs(DeviceControlString),
    /// Operating System Command payload (terminator stripped).
    Osc(Vec<u8>),
    /// Single Shift 3: `ESC O x`.
    Ss3(u8),
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csi(csi) => csi.fmt(f),
            Self::Dcs(dcs) => dcs.fmt(f),
            Self::Osc(data) => write!(f, "OSC ({} bytes) ST", data.len()),
            Self::Ss3(b) => write!(f, "SS3 {}", char::from(*b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csi(params: &[u8], final_byte: u8) -> ControlSequence {
        ControlSequence::new(None, parse_params(params), &[], final_byte)
    }

    #[test]
    fn params_are_one_indexed() {
        let seq = csi(b"27;5;97", b'~');
        assert_eq!(seq.param(1, 0), 27);
        assert_eq!(seq.param(2, 1), 5);
        assert_eq!(seq.param(3, 0), 97);
        assert_eq!(seq.param_count(), 3);
    }

    #[test]
    fn index_zero_and_out_of_range_use_default() {
        let seq = csi(b"27", b'~');
        assert_eq!(seq.param(0, 9), 9);
        assert_eq!(seq.param(4, 9), 9);
        assert!(!seq.has_param(2));
    }

    #[test]
    fn empty_fields_use_default() {
        let seq = csi(b"27;;13", b'~');
        assert_eq!(seq.param_count(), 3);
        assert_eq!(seq.param(2, 1), 1);
        assert!(!seq.has_param(2));
        assert!(seq.has_param(3));
    }

    #[test]
    fn overflow_is_treated_as_absent() {
        let seq = csi(b"27;99999999999;97", b'~');
        assert_eq!(seq.param(2, 1), 1);
    }

    #[test]
    fn colon_subparams_keep_first_value() {
        let seq = csi(b"97:65;5", b'u');
        assert_eq!(seq.param(1, 0), 97);
        assert_eq!(seq.param(2, 1), 5);
    }

    #[test]
    fn empty_block_has_no_params() {
        assert_eq!(csi(b"", b'c').param_count(), 0);
    }

    #[test]
    fn is_plain_checks_marker_and_final() {
        assert!(csi(b"27;1;13", b'~').is_plain(b'~'));
        let marked = ControlSequence::new(Some(b'>'), parse_params(b"4;1"), &[], b'm');
        assert!(!marked.is_plain(b'm'));
    }

    #[test]
    fn display_uses_mnemonic_notation() {
        let seq = ControlSequence::new(Some(b'>'), parse_params(b"4;2"), &[], b'm');
        assert_eq!(seq.to_string(), "CSI > 4 ; 2 m");
        let dcs = DeviceControlString::new(Some(b'>'), Params::new(), &[], b'|', b"XTerm(380)".to_vec());
        assert_eq!(dcs.to_string(), "DCS > | (10 bytes) ST");
        assert_eq!(Sequence::Ss3(b'P').to_string(), "SS3 P");
    }

    #[test]
    fn dcs_payload_lossy() {
        let dcs = DeviceControlString::new(None, Params::new(), &[], b'|', vec![b'o', b'k', 0xFF]);
        assert_eq!(dcs.data_lossy(), "ok\u{FFFD}");
    }
}
