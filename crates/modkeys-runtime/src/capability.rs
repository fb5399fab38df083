#![forbid(unsafe_code)]

//! Capability request commands.
//!
//! Each helper returns a [`Cmd::Request`]. Nothing is written until the
//! runtime executes the command, and no helper waits for a reply: replies
//! arrive later as [`InputMsg`](modkeys_core::event::InputMsg) reports.

use modkeys_core::event::ReportingMode;
use modkeys_core::request::TerminalRequest;

use crate::program::Cmd;

/// Ask the terminal to switch `modifyOtherKeys` to `mode`.
#[must_use]
pub fn set_reporting_mode<M>(mode: ReportingMode) -> Cmd<M> {
    Cmd::request(TerminalRequest::SetModifyOtherKeys(mode))
}

/// Ask the terminal to stop extended key reporting.
///
/// Same bytes as `set_reporting_mode(ReportingMode::Disabled)`.
#[must_use]
pub fn disable_reporting_mode<M>() -> Cmd<M> {
    set_reporting_mode(ReportingMode::Disabled)
}

/// Ask the terminal which `modifyOtherKeys` mode is active.
#[must_use]
pub fn query_reporting_mode<M>() -> Cmd<M> {
    Cmd::request(TerminalRequest::QueryModifyOtherKeys)
}

/// Ask the terminal for its name and version (XTVERSION).
#[must_use]
pub fn query_terminal_version<M>() -> Cmd<M> {
    Cmd::request(TerminalRequest::QueryTerminalVersion)
}
