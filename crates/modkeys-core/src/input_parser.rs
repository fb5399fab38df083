#![forbid(unsafe_code)]

//! Input tokenizer state machine.
//!
//! Splits raw terminal bytes into [`Token`]s: printable characters, C0
//! control bytes, ESC-prefixed (Alt) bytes and complete escape sequences.
//! Interpretation of those tokens lives in [`crate::key_decoder`] and
//! [`crate::report`].
//!
//! # Design
//!
//! The parser handles:
//! - ASCII characters and control codes
//! - UTF-8 multi-byte sequences
//! - CSI sequences, split into marker, parameters, intermediates, final byte
//! - SS3 (`ESC O x`)
//! - DCS and OSC strings terminated by ST (`ESC \`), OSC also by BEL
//!
//! Sequences may span any number of [`InputParser::parse`] calls.
//!
//! # DoS Protection
//!
//! - CSI sequences: 256 bytes max
//! - DCS and OSC strings: 4KB max
//!
//! A sequence that exceeds its limit is dropped. The parser then discards
//! bytes up to the sequence's own terminator (the final byte of a CSI, ST
//! or BEL for strings) so the tail of an oversized sequence never surfaces
//! as typed characters.

#[cfg(feature = "tracing")]
use crate::logging::debug;
#[cfg(not(feature = "tracing"))]
use crate::debug;

use crate::sequence::{ControlSequence, DeviceControlString, Params, Sequence, parse_params};

/// DoS protection: maximum CSI sequence length.
const MAX_CSI_LEN: usize = 256;

/// DoS protection: maximum DCS/OSC string length.
const MAX_STRING_LEN: usize = 4096;

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// A lexical unit of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A printable character (ASCII or a complete UTF-8 scalar).
    Char(char),
    /// A C0 control byte (0x00..=0x1F, except ESC) or DEL (0x7F).
    Control(u8),
    /// An ASCII byte preceded by ESC (the legacy Alt encoding).
    Alt(u8),
    /// A lone ESC with nothing following it.
    Escape,
    /// A complete escape sequence.
    Sequence(Sequence),
}

/// Parser state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    /// Normal character input.
    #[default]
    Ground,
    /// After ESC (0x1B).
    Escape,
    /// Collecting a CSI sequence after `ESC [`.
    Csi,
    /// After `ESC O`.
    Ss3,
    /// Collecting a DCS header after `ESC P`.
    DcsHeader,
    /// Collecting DCS payload.
    DcsData,
    /// After ESC inside DCS payload (for the ST terminator).
    DcsEscape,
    /// Collecting OSC content after `ESC ]`.
    Osc,
    /// After ESC inside OSC content.
    OscEscape,
    /// Discarding an oversized CSI until its final byte.
    CsiIgnore,
    /// Discarding an oversized DCS until ST.
    DcsIgnore,
    /// Discarding an oversized OSC until ST or BEL.
    OscIgnore,
    /// After ESC inside a discarded string.
    StringIgnoreEscape,
    /// Collecting a UTF-8 multi-byte sequence.
    Utf8 {
        /// Bytes collected so far.
        collected: u8,
        /// Total bytes expected.
        expected: u8,
    },
}

/// Terminal input tokenizer with DoS protection.
///
/// ```
/// use modkeys_core::input_parser::{InputParser, Token};
///
/// let mut parser = InputParser::new();
/// let tokens = parser.parse(b"a\x1b[27;5;97~");
/// assert_eq!(tokens.len(), 2);
/// assert_eq!(tokens[0], Token::Char('a'));
/// ```
#[derive(Debug)]
pub struct InputParser {
    state: ParserState,
    /// CSI/DCS header or OSC content collected so far.
    buffer: Vec<u8>,
    /// DCS payload collected so far.
    data: Vec<u8>,
    /// Final byte of the DCS header being collected.
    dcs_final: u8,
    utf8_buffer: [u8; 4],
}

impl Default for InputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InputParser {
    /// Create a new parser in the ground state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            buffer: Vec::with_capacity(64),
            data: Vec::new(),
            dcs_final: 0,
            utf8_buffer: [0; 4],
        }
    }

    /// Tokenize input bytes, returning every token completed by them.
    pub fn parse(&mut self, input: &[u8]) -> Vec<Token> {
        let mut tokens = Vec::new();
        for &byte in input {
            self.process_byte(byte, &mut tokens);
        }
        tokens
    }

    /// Resolve an ambiguous pending prefix once input has gone idle.
    ///
    /// A held ESC becomes [`Token::Escape`]; a held `ESC O` becomes
    /// `Alt('O')`. Partial CSI/DCS/OSC sequences are kept.
    pub fn flush(&mut self) -> Option<Token> {
        match self.state {
            ParserState::Escape => {
                self.state = ParserState::Ground;
                Some(Token::Escape)
            }
            ParserState::Ss3 => {
                self.state = ParserState::Ground;
                Some(Token::Alt(b'O'))
            }
            _ => None,
        }
    }

    /// True when bytes are held waiting for the rest of a sequence.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.state != ParserState::Ground
    }

    fn process_byte(&mut self, byte: u8, out: &mut Vec<Token>) {
        match self.state {
            ParserState::Ground => self.process_ground(byte, out),
            ParserState::Escape => self.process_escape(byte, out),
            ParserState::Csi => self.process_csi(byte, out),
            ParserState::Ss3 => self.process_ss3(byte, out),
            ParserState::DcsHeader => self.process_dcs_header(byte, out),
            ParserState::DcsData => self.process_dcs_data(byte),
            ParserState::DcsEscape => self.process_dcs_escape(byte, out),
            ParserState::Osc => self.process_osc(byte, out),
            ParserState::OscEscape => self.process_osc_escape(byte, out),
            ParserState::CsiIgnore => self.process_csi_ignore(byte, out),
            ParserState::DcsIgnore => self.process_string_ignore(byte, false),
            ParserState::OscIgnore => self.process_string_ignore(byte, true),
            ParserState::StringIgnoreEscape => self.process_string_ignore_escape(byte, out),
            ParserState::Utf8 {
                collected,
                expected,
            } => self.process_utf8(byte, collected, expected, out),
        }
    }

    fn process_ground(&mut self, byte: u8, out: &mut Vec<Token>) {
        match byte {
            ESC => self.state = ParserState::Escape,
            0x00..=0x1F | 0x7F => out.push(Token::Control(byte)),
            0x20..=0x7E => out.push(Token::Char(char::from(byte))),
            0xC0..=0xDF => self.start_utf8(byte, 2),
            0xE0..=0xEF => self.start_utf8(byte, 3),
            0xF0..=0xF7 => self.start_utf8(byte, 4),
            // Stray continuation bytes and invalid leads.
            _ => {}
        }
    }

    fn start_utf8(&mut self, lead: u8, expected: u8) {
        self.utf8_buffer[0] = lead;
        self.state = ParserState::Utf8 {
            collected: 1,
            expected,
        };
    }

    fn process_escape(&mut self, byte: u8, out: &mut Vec<Token>) {
        self.buffer.clear();
        match byte {
            b'[' => self.state = ParserState::Csi,
            b'O' => self.state = ParserState::Ss3,
            b'P' => {
                self.data.clear();
                self.state = ParserState::DcsHeader;
            }
            b']' => self.state = ParserState::Osc,
            0x00..=0x7F => {
                self.state = ParserState::Ground;
                out.push(Token::Alt(byte));
            }
            _ => {
                self.state = ParserState::Ground;
                out.push(Token::Escape);
                self.process_ground(byte, out);
            }
        }
    }

    /// Abort the current sequence and hand `byte` to the ground state.
    fn abort_to_ground(&mut self, byte: u8, out: &mut Vec<Token>) {
        self.buffer.clear();
        self.data.clear();
        self.state = ParserState::Ground;
        self.process_ground(byte, out);
    }

    /// Collect one header byte of a CSI or DCS sequence.
    ///
    /// Returns `Some(final)` once the final byte arrives, `None` while still
    /// collecting. On an invalid byte the sequence is aborted.
    fn collect_header(&mut self, byte: u8, limit: usize, out: &mut Vec<Token>) -> Option<u8> {
        match byte {
            0x30..=0x3F => {
                // Parameter bytes may not follow intermediates.
                if self.buffer.last().is_some_and(|b| (0x20..=0x2F).contains(b)) {
                    self.abort_to_ground(byte, out);
                    return None;
                }
                self.push_bounded(byte, limit);
                None
            }
            0x20..=0x2F => {
                self.push_bounded(byte, limit);
                None
            }
            0x40..=0x7E => Some(byte),
            0x7F => None,
            _ => {
                self.abort_to_ground(byte, out);
                None
            }
        }
    }

    fn push_bounded(&mut self, byte: u8, limit: usize) {
        if self.buffer.len() + self.data.len() >= limit {
            self.overflow(limit);
            return;
        }
        self.buffer.push(byte);
    }

    /// Drop the sequence being collected and discard the rest of it.
    fn overflow(&mut self, limit: usize) {
        debug!(limit, "escape sequence exceeded length limit; dropped");
        self.buffer.clear();
        self.data.clear();
        self.state = match self.state {
            ParserState::Csi => ParserState::CsiIgnore,
            ParserState::Osc => ParserState::OscIgnore,
            _ => ParserState::DcsIgnore,
        };
    }

    fn process_csi_ignore(&mut self, byte: u8, out: &mut Vec<Token>) {
        match byte {
            0x20..=0x3F | 0x7F => {}
            0x40..=0x7E => self.state = ParserState::Ground,
            _ => self.abort_to_ground(byte, out),
        }
    }

    fn process_string_ignore(&mut self, byte: u8, bel_terminates: bool) {
        match byte {
            ESC => self.state = ParserState::StringIgnoreEscape,
            BEL if bel_terminates => self.state = ParserState::Ground,
            _ => {}
        }
    }

    fn process_string_ignore_escape(&mut self, byte: u8, out: &mut Vec<Token>) {
        if byte == b'\\' {
            self.state = ParserState::Ground;
        } else {
            self.process_escape(byte, out);
        }
    }

    fn process_csi(&mut self, byte: u8, out: &mut Vec<Token>) {
        if let Some(final_byte) = self.collect_header(byte, MAX_CSI_LEN, out) {
            let (marker, params, intermediates) = split_header(&self.buffer);
            let seq = ControlSequence::new(marker, params, intermediates, final_byte);
            self.buffer.clear();
            self.state = ParserState::Ground;
            out.push(Token::Sequence(Sequence::Csi(seq)));
        }
    }

    fn process_ss3(&mut self, byte: u8, out: &mut Vec<Token>) {
        if (0x40..=0x7E).contains(&byte) {
            self.state = ParserState::Ground;
            out.push(Token::Sequence(Sequence::Ss3(byte)));
        } else {
            out.push(Token::Alt(b'O'));
            self.abort_to_ground(byte, out);
        }
    }

    fn process_dcs_header(&mut self, byte: u8, out: &mut Vec<Token>) {
        if let Some(final_byte) = self.collect_header(byte, MAX_STRING_LEN, out) {
            self.dcs_final = final_byte;
            self.state = ParserState::DcsData;
        }
    }

    fn process_dcs_data(&mut self, byte: u8) {
        if byte == ESC {
            self.state = ParserState::DcsEscape;
            return;
        }
        if self.buffer.len() + self.data.len() >= MAX_STRING_LEN {
            self.overflow(MAX_STRING_LEN);
            return;
        }
        self.data.push(byte);
    }

    fn process_dcs_escape(&mut self, byte: u8, out: &mut Vec<Token>) {
        if byte == b'\\' {
            let (marker, params, intermediates) = split_header(&self.buffer);
            let dcs = DeviceControlString::new(
                marker,
                params,
                intermediates,
                self.dcs_final,
                std::mem::take(&mut self.data),
            );
            self.buffer.clear();
            self.state = ParserState::Ground;
            out.push(Token::Sequence(Sequence::Dcs(dcs)));
        } else {
            // Unterminated string: the ESC starts a new sequence.
            self.buffer.clear();
            self.data.clear();
            self.process_escape(byte, out);
        }
    }

    fn process_osc(&mut self, byte: u8, out: &mut Vec<Token>) {
        match byte {
            BEL => self.finish_osc(out),
            ESC => self.state = ParserState::OscEscape,
            _ => {
                if self.buffer.len() >= MAX_STRING_LEN {
                    self.overflow(MAX_STRING_LEN);
                    return;
                }
                self.buffer.push(byte);
            }
        }
    }

    fn finish_osc(&mut self, out: &mut Vec<Token>) {
        self.state = ParserState::Ground;
        out.push(Token::Sequence(Sequence::Osc(std::mem::take(&mut self.buffer))));
    }

    fn process_osc_escape(&mut self, byte: u8, out: &mut Vec<Token>) {
        if byte == b'\\' {
            self.finish_osc(out);
        } else {
            self.buffer.clear();
            self.process_escape(byte, out);
        }
    }

    fn process_utf8(&mut self, byte: u8, collected: u8, expected: u8, out: &mut Vec<Token>) {
        if (byte & 0xC0) != 0x80 {
            self.abort_to_ground(byte, out);
            return;
        }

        self.utf8_buffer[usize::from(collected)] = byte;
        let collected = collected + 1;

        if collected < expected {
            self.state = ParserState::Utf8 {
                collected,
                expected,
            };
            return;
        }

        self.state = ParserState::Ground;
        if let Some(c) = std::str::from_utf8(&self.utf8_buffer[..usize::from(expected)])
            .ok()
            .and_then(|s| s.chars().next())
        {
            out.push(Token::Char(c));
        }
    }
}

/// Split collected header bytes into marker, parameters and intermediates.
fn split_header(bytes: &[u8]) -> (Option<u8>, Params, &[u8]) {
    let (marker, rest) = match bytes.split_first() {
        Some((&m @ (b'<' | b'=' | b'>' | b'?'), rest)) => (Some(m), rest),
        _ => (None, bytes),
    };
    let split = rest
        .iter()
        .position(|b| (0x20..=0x2F).contains(b))
        .unwrap_or(rest.len());
    (marker, parse_params(&rest[..split]), &rest[split..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csi(tokens: &[Token]) -> &ControlSequence {
        match tokens {
            [Token::Sequence(Sequence::Csi(seq))] => seq,
            other => panic!("expected one CSI token, got {other:?}"),
        }
    }

    #[test]
    fn printable_and_control_bytes() {
        let mut parser = InputParser::new();
        assert_eq!(
            parser.parse(b"a\r\x7f"),
            vec![Token::Char('a'), Token::Control(0x0D), Token::Control(0x7F)]
        );
    }

    #[test]
    fn utf8_is_assembled() {
        let mut parser = InputParser::new();
        assert_eq!(parser.parse("é€😀".as_bytes()), vec![
            Token::Char('é'),
            Token::Char('€'),
            Token::Char('😀'),
        ]);
    }

    #[test]
    fn utf8_split_across_calls() {
        let mut parser = InputParser::new();
        let bytes = "€".as_bytes();
        assert!(parser.parse(&bytes[..1]).is_empty());
        assert!(parser.parse(&bytes[1..2]).is_empty());
        assert_eq!(parser.parse(&bytes[2..]), vec![Token::Char('€')]);
    }

    #[test]
    fn truncated_utf8_keeps_following_byte() {
        let mut parser = InputParser::new();
        assert_eq!(parser.parse(b"\xE2a"), vec![Token::Char('a')]);
    }

    #[test]
    fn csi_is_split_into_parts() {
        let mut parser = InputParser::new();
        let tokens = parser.parse(b"\x1b[27;5;97~");
        let seq = csi(&tokens);
        assert!(seq.is_plain(b'~'));
        assert_eq!(seq.params(), &[Some(27), Some(5), Some(97)]);
    }

    #[test]
    fn csi_marker_and_intermediates() {
        let mut parser = InputParser::new();
        let tokens = parser.parse(b"\x1b[>4;2m");
        let seq = csi(&tokens);
        assert_eq!(seq.marker, Some(b'>'));
        assert_eq!(seq.final_byte, b'm');
        assert_eq!(seq.param(2, 0), 2);

        let tokens = parser.parse(b"\x1b[2 q");
        let seq = csi(&tokens);
        assert_eq!(seq.intermediates.as_slice(), b" ");
        assert_eq!(seq.final_byte, b'q');
    }

    #[test]
    fn csi_split_across_calls() {
        let mut parser = InputParser::new();
        assert!(parser.parse(b"\x1b[27;").is_empty());
        assert!(parser.has_pending());
        assert!(parser.parse(b"1;1").is_empty());
        let tokens = parser.parse(b"3~");
        assert_eq!(csi(&tokens).param(3, 0), 13);
        assert!(!parser.has_pending());
    }

    #[test]
    fn csi_length_limit() {
        let mut parser = InputParser::new();
        let mut seq = b"\x1b[".to_vec();
        seq.extend(std::iter::repeat_n(b'1', MAX_CSI_LEN + 10));
        seq.push(b'~');
        seq.push(b'x');
        assert_eq!(parser.parse(&seq), vec![Token::Char('x')]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn oversized_csi_split_across_calls() {
        let mut parser = InputParser::new();
        assert!(parser.parse(b"\x1b[27;1;").is_empty());
        for _ in 0..8 {
            assert!(parser.parse(&[b'9'; 64]).is_empty());
        }
        assert!(parser.has_pending());
        assert!(parser.parse(b"~").is_empty());
        let tokens = parser.parse(b"\x1b[27;1;13~");
        assert_eq!(csi(&tokens).param(3, 0), 13);
    }

    #[test]
    fn control_byte_ends_oversized_csi() {
        let mut parser = InputParser::new();
        let mut seq = b"\x1b[".to_vec();
        seq.extend(std::iter::repeat_n(b'1', MAX_CSI_LEN + 1));
        seq.push(b'\r');
        assert_eq!(parser.parse(&seq), vec![Token::Control(b'\r')]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn control_byte_aborts_csi() {
        let mut parser = InputParser::new();
        assert_eq!(parser.parse(b"\x1b[12\n"), vec![Token::Control(b'\n')]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn alt_prefix() {
        let mut parser = InputParser::new();
        assert_eq!(parser.parse(b"\x1ba"), vec![Token::Alt(b'a')]);
        assert_eq!(parser.parse(b"\x1b\x1b"), vec![Token::Alt(ESC)]);
        assert_eq!(parser.parse(b"\x1b\x7f"), vec![Token::Alt(0x7F)]);
    }

    #[test]
    fn lone_escape_waits_for_flush() {
        let mut parser = InputParser::new();
        assert!(parser.parse(b"\x1b").is_empty());
        assert!(parser.has_pending());
        assert_eq!(parser.flush(), Some(Token::Escape));
        assert_eq!(parser.flush(), None);
        assert_eq!(parser.parse(b"a"), vec![Token::Char('a')]);
    }

    #[test]
    fn flush_keeps_partial_csi() {
        let mut parser = InputParser::new();
        parser.parse(b"\x1b[27");
        assert_eq!(parser.flush(), None);
        assert!(parser.has_pending());
    }

    #[test]
    fn ss3_sequences() {
        let mut parser = InputParser::new();
        assert_eq!(
            parser.parse(b"\x1bOP"),
            vec![Token::Sequence(Sequence::Ss3(b'P'))]
        );
        parser.parse(b"\x1bO");
        assert_eq!(parser.flush(), Some(Token::Alt(b'O')));
    }

    #[test]
    fn dcs_with_st() {
        let mut parser = InputParser::new();
        let tokens = parser.parse(b"\x1bP>|XTerm(380)\x1b\\");
        match tokens.as_slice() {
            [Token::Sequence(Sequence::Dcs(dcs))] => {
                assert_eq!(dcs.marker, Some(b'>'));
                assert_eq!(dcs.final_byte, b'|');
                assert_eq!(dcs.data, b"XTerm(380)");
            }
            other => panic!("expected DCS, got {other:?}"),
        }
    }

    #[test]
    fn dcs_split_across_calls() {
        let mut parser = InputParser::new();
        assert!(parser.parse(b"\x1bP>|kit").is_empty());
        assert!(parser.parse(b"ty(0.3").is_empty());
        assert!(parser.parse(b")\x1b").is_empty());
        let tokens = parser.parse(b"\\");
        assert!(matches!(
            tokens.as_slice(),
            [Token::Sequence(Sequence::Dcs(dcs))] if dcs.data == b"kitty(0.3)"
        ));
    }

    #[test]
    fn dcs_length_limit() {
        let mut parser = InputParser::new();
        let mut seq = b"\x1bP>|".to_vec();
        seq.extend(std::iter::repeat_n(b'x', MAX_STRING_LEN + 1));
        seq.extend_from_slice(b"\x1b\\");
        seq.push(b'y');
        assert_eq!(parser.parse(&seq), vec![Token::Char('y')]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn oversized_dcs_header_is_discarded() {
        let mut parser = InputParser::new();
        let mut seq = b"\x1bP".to_vec();
        seq.extend(std::iter::repeat_n(b';', MAX_STRING_LEN + 1));
        seq.extend_from_slice(b"|abc\x1b\\");
        assert!(parser.parse(&seq).is_empty());
        assert!(!parser.has_pending());
    }

    #[test]
    fn oversized_osc_is_discarded() {
        let mut parser = InputParser::new();
        let mut seq = b"\x1b]0;".to_vec();
        seq.extend(std::iter::repeat_n(b't', MAX_STRING_LEN + 1));
        seq.push(BEL);
        seq.push(b'z');
        assert_eq!(parser.parse(&seq), vec![Token::Char('z')]);

        let mut seq = b"\x1b]0;".to_vec();
        seq.extend(std::iter::repeat_n(b't', MAX_STRING_LEN + 1));
        seq.extend_from_slice(b"\x1b\\");
        assert!(parser.parse(&seq).is_empty());
        assert!(!parser.has_pending());
    }

    #[test]
    fn oversized_string_yields_to_new_sequence() {
        let mut parser = InputParser::new();
        let mut seq = b"\x1bP>|".to_vec();
        seq.extend(std::iter::repeat_n(b'v', MAX_STRING_LEN + 1));
        seq.extend_from_slice(b"\x1b[27;1;13~");
        let tokens = parser.parse(&seq);
        assert_eq!(csi(&tokens).param(3, 0), 13);
    }

    #[test]
    fn unterminated_dcs_yields_to_new_sequence() {
        let mut parser = InputParser::new();
        let tokens = parser.parse(b"\x1bP>|abc\x1b[27;1;13~");
        assert!(matches!(
            tokens.as_slice(),
            [Token::Sequence(Sequence::Csi(seq))] if seq.param(3, 0) == 13
        ));
    }

    #[test]
    fn osc_terminators() {
        let mut parser = InputParser::new();
        assert_eq!(
            parser.parse(b"\x1b]11;rgb:0000/0000/0000\x07"),
            vec![Token::Sequence(Sequence::Osc(b"11;rgb:0000/0000/0000".to_vec()))]
        );
        let tokens = parser.parse(b"\x1b]0;title\x1b\\");
        assert_eq!(
            tokens,
            vec![Token::Sequence(Sequence::Osc(b"0;title".to_vec()))]
        );
    }
}
