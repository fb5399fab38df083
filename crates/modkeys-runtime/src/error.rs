#![forbid(unsafe_code)]

//! Runtime errors.
//!
//! Decoding never fails; the only failures the runtime reports come from
//! the terminal device and from its own threads.

use std::io;

use thiserror::Error;

/// Errors returned by [`crate::program::Program`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Reading from or writing to the terminal failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The input thread panicked instead of exiting cleanly.
    #[error("input thread panicked")]
    InputThreadPanicked,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
