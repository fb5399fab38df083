#![forbid(unsafe_code)]

//! Capability negotiation state.
//!
//! Terminal capability queries are answered asynchronously, in the same
//! byte stream as key input, with nothing tying a reply to its request.
//! [`NegotiationState`] tracks, per capability, whether a query is
//! outstanding, and records what the terminal last reported.
//!
//! # Design Notes
//!
//! - One entry per capability kind, so at most one outstanding query each.
//!   A repeated query before its reply leaves the entry `Awaiting`.
//! - A report is matched to whatever is outstanding for its kind. A report
//!   with nothing outstanding is still delivered and counts as unsolicited.
//! - There is no timeout. A terminal that never answers leaves the entry
//!   `Awaiting` until the state is dropped.
//! - The state is owned by the update loop and mutated only there.

use std::fmt;

#[cfg(feature = "tracing")]
use crate::logging::debug;
#[cfg(not(feature = "tracing"))]
use crate::debug;

use crate::event::{InputMsg, ReportingMode};
use crate::request::TerminalRequest;

/// A negotiable terminal capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// xterm `modifyOtherKeys` reporting.
    ModifyOtherKeys,
    /// XTVERSION terminal identification.
    TerminalVersion,
}

impl Capability {
    /// Every capability, in table order.
    pub const ALL: [Self; 2] = [Self::ModifyOtherKeys, Self::TerminalVersion];

    const fn index(self) -> usize {
        match self {
            Self::ModifyOtherKeys => 0,
            Self::TerminalVersion => 1,
        }
    }

    /// Stable name for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ModifyOtherKeys => "modify_other_keys",
            Self::TerminalVersion => "terminal_version",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Negotiation phase of one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Nothing outstanding.
    #[default]
    Idle,
    /// A query was written and its reply has not arrived.
    Awaiting,
}

/// Outcome of settling a report against the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Settlement {
    /// The report answered an outstanding query.
    Matched(Capability),
    /// Nothing was outstanding; the report was spontaneous or late.
    Unsolicited(Capability),
}

impl Settlement {
    /// The capability the report concerned.
    #[must_use]
    pub const fn capability(self) -> Capability {
        match self {
            Self::Matched(c) | Self::Unsolicited(c) => c,
        }
    }
}

/// Per-capability negotiation bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationState {
    phases: [Phase; 2],
    requested_mode: Option<ReportingMode>,
    reported_mode: Option<ReportingMode>,
    terminal_version: Option<String>,
}

impl NegotiationState {
    /// Create a state with every capability idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase of `capability`.
    #[must_use]
    pub fn phase(&self, capability: Capability) -> Phase {
        self.phases[capability.index()]
    }

    /// True if a query for `capability` is outstanding.
    #[must_use]
    pub fn is_awaiting(&self, capability: Capability) -> bool {
        self.phase(capability) == Phase::Awaiting
    }

    /// Capabilities with an outstanding query.
    pub fn outstanding(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(|&c| self.is_awaiting(c))
    }

    /// The reporting mode most recently requested, if any.
    #[must_use]
    pub fn requested_mode(&self) -> Option<ReportingMode> {
        self.requested_mode
    }

    /// The reporting mode most recently reported by the terminal, if any.
    #[must_use]
    pub fn reported_mode(&self) -> Option<ReportingMode> {
        self.reported_mode
    }

    /// The terminal version most recently reported, if any.
    #[must_use]
    pub fn terminal_version(&self) -> Option<&str> {
        self.terminal_version.as_deref()
    }

    /// Record that `request` is being written to the terminal.
    ///
    /// Queries mark their capability `Awaiting`. A set request only records
    /// the requested mode: the terminal does not acknowledge it.
    pub fn begin(&mut self, request: TerminalRequest) {
        match request {
            TerminalRequest::SetModifyOtherKeys(mode) => {
                self.requested_mode = Some(mode);
                debug!(
                    target: "modkeys.negotiation",
                    mode = mode.as_param(),
                    "reporting mode requested"
                );
            }
            TerminalRequest::QueryModifyOtherKeys | TerminalRequest::QueryTerminalVersion => {
                let capability = request.capability();
                let slot = &mut self.phases[capability.index()];
                debug!(
                    target: "modkeys.negotiation",
                    capability = capability.name(),
                    repeated = *slot == Phase::Awaiting,
                    "query outstanding"
                );
                *slot = Phase::Awaiting;
            }
        }
    }

    /// Settle a delivered message against the state.
    ///
    /// Report messages clear their capability's outstanding flag and update
    /// the recorded values. Other messages return `None` and change nothing.
    pub fn settle(&mut self, msg: &InputMsg) -> Option<Settlement> {
        let capability = match msg {
            InputMsg::ReportingMode(mode) => {
                self.reported_mode = Some(*mode);
                Capability::ModifyOtherKeys
            }
            InputMsg::TerminalVersion(version) => {
                self.terminal_version = Some(version.clone());
                Capability::TerminalVersion
            }
            InputMsg::KeyPress(_) | InputMsg::Unrecognized(_) => return None,
        };

        let slot = &mut self.phases[capability.index()];
        let settlement = match *slot {
            Phase::Awaiting => Settlement::Matched(capability),
            Phase::Idle => Settlement::Unsolicited(capability),
        };
        *slot = Phase::Idle;

        debug!(
            target: "modkeys.negotiation",
            capability = capability.name(),
            matched = matches!(settlement, Settlement::Matched(_)),
            "report settled"
        );
        Some(settlement)
    }
}
