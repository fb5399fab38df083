#![forbid(unsafe_code)]

//! Inbound decoding pipeline.
//!
//! [`InputDecoder`] chains the tokenizer, the key decoder and report
//! recognition into one step from bytes to [`InputMsg`]s. It holds no
//! negotiation state, so it can live on the input thread while the update
//! loop owns the [`crate::negotiation::NegotiationState`].

#[cfg(feature = "tracing")]
use crate::logging::trace;
#[cfg(not(feature = "tracing"))]
use crate::trace;

use crate::event::InputMsg;
use crate::input_parser::{InputParser, Token};
use crate::key_decoder::{decode_alt, decode_char, decode_control, decode_extended_key};
use crate::report::recognize;
use crate::sequence::Sequence;

/// Bytes in, messages out.
#[derive(Debug, Default)]
pub struct InputDecoder {
    parser: InputParser,
}

impl InputDecoder {
    /// Create a decoder in the ground state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk of terminal input.
    ///
    /// Sequences split across chunks are completed by later calls.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<InputMsg> {
        self.parser
            .parse(bytes)
            .into_iter()
            .map(token_to_message)
            .collect()
    }

    /// Emit a held lone ESC (or similar ambiguous prefix) once input is idle.
    pub fn flush(&mut self) -> Option<InputMsg> {
        self.parser.flush().map(token_to_message)
    }

    /// True while bytes are held for an incomplete sequence.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.parser.has_pending()
    }
}

/// Map one token to its message. Sequences nobody claims pass through.
fn token_to_message(token: Token) -> InputMsg {
    match token {
        Token::Char(c) => decode_char(c).into(),
        Token::Control(byte) => decode_control(byte).into(),
        Token::Alt(byte) => decode_alt(byte).into(),
        Token::Escape => decode_control(0x1B).into(),
        Token::Sequence(seq) => sequence_to_message(seq),
    }
}

fn sequence_to_message(seq: Sequence) -> InputMsg {
    let key = match &seq {
        Sequence::Csi(csi) => decode_extended_key(csi),
        _ => None,
    };
    if let Some(key) = key {
        return key.into();
    }
    if let Some(msg) = recognize(&seq).and_then(|signal| signal.into_message()) {
        return msg;
    }
    trace!(sequence = %seq, "unrecognized sequence passed through");
    InputMsg::Unrecognized(seq)
}
