#![forbid(unsafe_code)]

//! Outbound capability requests.
//!
//! A [`TerminalRequest`] is the payload of a capability command: what to
//! ask of the terminal, and the exact bytes that ask it.
//!
//! | request | bytes |
//! |---|---|
//! | set mode N | `CSI > 4 ; N m` |
//! | query mode | `CSI ? 4 m` |
//! | query version | `CSI > 0 q` |
//!
//! Disabling the reporting mode is setting mode 0; there is no separate
//! request for it.

use std::fmt;
use std::io::{self, Write};

use crate::event::ReportingMode;
use crate::negotiation::Capability;

/// A request written to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalRequest {
    /// Set the `modifyOtherKeys` reporting mode.
    SetModifyOtherKeys(ReportingMode),
    /// Ask for the current `modifyOtherKeys` mode.
    QueryModifyOtherKeys,
    /// Ask for the terminal's name and version (XTVERSION).
    QueryTerminalVersion,
}

impl TerminalRequest {
    /// The capability this request concerns.
    #[must_use]
    pub const fn capability(self) -> Capability {
        match self {
            Self::SetModifyOtherKeys(_) | Self::QueryModifyOtherKeys => {
                Capability::ModifyOtherKeys
            }
            Self::QueryTerminalVersion => Capability::TerminalVersion,
        }
    }

    /// True if the terminal is expected to answer.
    #[must_use]
    pub const fn is_query(self) -> bool {
        !matches!(self, Self::SetModifyOtherKeys(_))
    }

    /// Write the wire encoding to `out`.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    pub fn encode<W: Write + ?Sized>(self, out: &mut W) -> io::Result<()> {
        match self {
            Self::SetModifyOtherKeys(mode) => write!(out, "\x1b[>4;{}m", mode.as_param()),
            Self::QueryModifyOtherKeys => out.write_all(b"\x1b[?4m"),
            Self::QueryTerminalVersion => out.write_all(b"\x1b[>0q"),
        }
    }

    /// The wire encoding as an owned buffer.
    #[must_use]
    pub fn to_bytes(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        // Writing into a Vec cannot fail.
        let _ = self.encode(&mut buf);
        buf
    }
}

/// Mnemonic form for logs, e.g. `CSI > 4 ; 2 m`.
impl fmt::Display for TerminalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetModifyOtherKeys(mode) => write!(f, "CSI > 4 ; {} m", mode.as_param()),
            Self::QueryModifyOtherKeys => f.write_str("CSI ? 4 m"),
            Self::QueryTerminalVersion => f.write_str("CSI > 0 q"),
        }
    }
}
