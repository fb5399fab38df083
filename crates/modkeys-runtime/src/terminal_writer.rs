#![forbid(unsafe_code)]

//! Terminal output path.
//!
//! Everything the runtime sends to the terminal goes through one
//! [`TerminalWriter`]: capability requests verbatim, log lines with every
//! escape sequence and control byte stripped so application text can never
//! change terminal state.

use std::borrow::Cow;
use std::io::{self, Write};

use modkeys_core::request::TerminalRequest;

/// The single writer for terminal output.
#[derive(Debug)]
pub struct TerminalWriter<W: Write> {
    out: W,
    requests_written: u64,
}

impl<W: Write> TerminalWriter<W> {
    /// Wrap an output stream.
    pub fn new(out: W) -> Self {
        Self {
            out,
            requests_written: 0,
        }
    }

    /// Write a capability request and flush it.
    ///
    /// # Errors
    ///
    /// Propagates write and flush errors.
    pub fn write_request(&mut self, request: TerminalRequest) -> io::Result<()> {
        request.encode(&mut self.out)?;
        self.out.flush()?;
        self.requests_written += 1;
        Ok(())
    }

    /// Write one sanitized log line, appending a newline if missing.
    ///
    /// # Errors
    ///
    /// Propagates write and flush errors.
    pub fn write_log(&mut self, text: &str) -> io::Result<()> {
        let clean = sanitize(text);
        self.out.write_all(clean.as_bytes())?;
        if !clean.ends_with('\n') {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }

    /// Number of requests written so far.
    #[must_use]
    pub fn requests_written(&self) -> u64 {
        self.requests_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }
}

/// Strip escape sequences and control characters from log text.
///
/// LF and TAB survive; CR becomes LF. CSI and OSC sequences are removed
/// whole, other escapes drop the ESC and the byte after it.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    let needs_cleaning = text
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\t');
    if !needs_cleaning {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.next() {
                Some('[') => {
                    // Parameters and intermediates, then one final byte.
                    for next in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&next) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    while let Some(next) = chars.next() {
                        if next == '\x07' {
                            break;
                        }
                        if next == '\x1b' {
                            chars.next_if_eq(&'\\');
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\r' => out.push('\n'),
            '\n' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
