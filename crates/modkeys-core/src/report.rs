#![forbid(unsafe_code)]

//! Capability report classification.
//!
//! Terminals answer capability queries in-band:
//!
//! | report | bytes |
//! |---|---|
//! | reporting mode | `CSI > 4 ; N m` |
//! | terminal version | `DCS > \| text ST` |
//!
//! [`recognize`] extracts a [`ReportSignal`] from a tokenized sequence.
//! [`ReportSignal::into_message`] turns it into an [`InputMsg`] without
//! touching any state, which is what the input thread does. [`classify`]
//! additionally settles the signal against a [`NegotiationState`], which is
//! what the update loop does.

#[cfg(feature = "tracing")]
use crate::logging::debug;
#[cfg(not(feature = "tracing"))]
use crate::debug;

use crate::event::{InputMsg, ReportingMode};
use crate::negotiation::NegotiationState;
use crate::sequence::Sequence;

/// Resource number of `modifyOtherKeys` in xterm's key modifier options.
const MODIFY_OTHER_KEYS_RESOURCE: u32 = 4;

/// A capability report with its value extracted from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReportSignal {
    /// Raw `modifyOtherKeys` mode value, not yet range-checked.
    ModifyOtherKeys(u32),
    /// XTVERSION payload.
    TerminalVersion(String),
}

impl ReportSignal {
    /// Build the message for this signal.
    ///
    /// A mode value outside 0..=2 yields `None`.
    #[must_use]
    pub fn into_message(self) -> Option<InputMsg> {
        match self {
            Self::ModifyOtherKeys(value) => {
                let mode = ReportingMode::from_param(value);
                if mode.is_none() {
                    debug!(value, "modifyOtherKeys report out of range; not classified");
                }
                mode.map(InputMsg::ReportingMode)
            }
            Self::TerminalVersion(version) => Some(InputMsg::TerminalVersion(version)),
        }
    }
}

/// Extract a report signal from a sequence.
///
/// Matches `CSI > 4 ; N m` (an absent `N` reads as 0) and `DCS > | text ST`
/// (text decoded as lossy UTF-8). Anything else yields `None`.
#[must_use]
pub fn recognize(seq: &Sequence) -> Option<ReportSignal> {
    match seq {
        Sequence::Csi(csi)
            if csi.marker == Some(b'>')
                && csi.intermediates.is_empty()
                && csi.final_byte == b'm'
                && csi.param(1, 0) == MODIFY_OTHER_KEYS_RESOURCE =>
        {
            Some(ReportSignal::ModifyOtherKeys(csi.param(2, 0)))
        }
        Sequence::Dcs(dcs)
            if dcs.marker == Some(b'>')
                && dcs.intermediates.is_empty()
                && dcs.final_byte == b'|' =>
        {
            Some(ReportSignal::TerminalVersion(dcs.data_lossy()))
        }
        _ => None,
    }
}

/// Turn a report signal into a message and settle it against `state`.
///
/// The message is produced whether or not a query was outstanding. An
/// out-of-range mode yields `None` and leaves `state` untouched.
pub fn classify(signal: ReportSignal, state: &mut NegotiationState) -> Option<InputMsg> {
    let msg = signal.into_message()?;
    state.settle(&msg);
    Some(msg)
}

/// [`recognize`] followed by [`classify`].
pub fn classify_sequence(seq: &Sequence, state: &mut NegotiationState) -> Option<InputMsg> {
    recognize(seq).and_then(|signal| classify(signal, state))
}
