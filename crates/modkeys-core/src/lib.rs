#![forbid(unsafe_code)]

//! Core: input decoding and capability negotiation for terminal runtimes.
//!
//! # Role in modkeys
//! `modkeys-core` is the input layer. It turns raw terminal bytes into typed
//! [`InputMsg`] values and tracks the asynchronous negotiation of two
//! optional terminal capabilities: xterm `modifyOtherKeys` and XTVERSION.
//!
//! # Primary responsibilities
//! - **Tokenizing**: [`input_parser`] splits bytes into characters, control
//!   bytes and escape sequences, with length limits on every sequence.
//! - **Key decoding**: [`key_decoder`] maps `CSI 27 ; m ; c ~` reports and
//!   legacy encodings to [`KeyPress`].
//! - **Reports**: [`report`] recognizes mode and version replies.
//! - **Negotiation**: [`negotiation`] records outstanding queries and what
//!   the terminal last reported.
//!
//! # How it fits in the system
//! `modkeys-runtime` runs an [`InputDecoder`] on its input thread and owns
//! the [`NegotiationState`] on its update loop. Nothing in this crate does
//! I/O or spawns threads.

pub mod decoder;
pub mod event;
pub mod input_parser;
pub mod key_decoder;
pub mod logging;
pub mod negotiation;
pub mod report;
pub mod request;
pub mod sequence;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

pub use decoder::InputDecoder;
pub use event::{InputMsg, KeyCode, KeyMod, KeyPress, ReportingMode};
pub use negotiation::{Capability, NegotiationState, Phase, Settlement};
pub use report::ReportSignal;
pub use request::TerminalRequest;
pub use sequence::{ControlSequence, DeviceControlString, Sequence};
