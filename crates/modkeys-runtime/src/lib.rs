#![forbid(unsafe_code)]

//! modkeys Runtime
//!
//! Drives an application model over a terminal that speaks xterm's
//! `modifyOtherKeys` protocol.
//!
//! # Key Components
//!
//! - [`Program`] - Elm-style update loop with an input thread
//! - [`Model`] - Trait for application state and behavior
//! - [`Cmd`] - Commands for side effects, capability requests included
//! - [`capability`] - Helpers that build capability request commands
//! - [`InputReader`] - Input thread feeding decoded messages to the loop
//! - [`TerminalWriter`] - Request and sanitized log output
//! - [`ProgramSimulator`] - Thread-free driver for tests
//!
//! # Role in modkeys
//! `modkeys-runtime` owns everything with side effects: the terminal, the
//! threads, and the negotiation state. Decoding lives in `modkeys-core`.
//!
//! # How it fits in the system
//! Bytes flow from the [`InputReader`] through the `modkeys-core` decoder
//! onto the program's queue. The update loop settles capability reports,
//! runs `Model::update`, and writes any requests the model returns.

pub mod capability;
pub mod error;
pub mod input_reader;
pub mod program;
pub mod simulator;
pub mod terminal_writer;

pub use error::{Result, RuntimeError};
#[cfg(unix)]
pub use input_reader::TtySource;
pub use input_reader::{ByteSource, InputReader, ReaderConfig, ReaderEvent, ReaderSource};
pub use program::{Cmd, Inbound, Model, Program, ProgramConfig};
pub use simulator::ProgramSimulator;
pub use terminal_writer::TerminalWriter;

pub use modkeys_core::event::{InputMsg, KeyCode, KeyMod, KeyPress, ReportingMode};
pub use modkeys_core::negotiation::{Capability, NegotiationState};
pub use modkeys_core::request::TerminalRequest;
