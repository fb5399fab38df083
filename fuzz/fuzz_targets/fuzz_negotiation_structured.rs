#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use modkeys_core::decoder::InputDecoder;
use modkeys_core::event::ReportingMode;
use modkeys_core::negotiation::{Capability, NegotiationState};
use modkeys_core::request::TerminalRequest;

#[derive(Debug, Arbitrary)]
enum Op {
    SetMode(u8),
    QueryMode,
    QueryVersion,
    ModeReport(u8),
    VersionReport(Vec<u8>),
    Raw(Vec<u8>),
}

fuzz_target!(|ops: Vec<Op>| {
    let mut decoder = InputDecoder::new();
    let mut state = NegotiationState::new();

    for op in ops {
        let bytes = match op {
            Op::SetMode(n) => {
                let mode = ReportingMode::from_param(u32::from(n % 3)).unwrap_or_default();
                state.begin(TerminalRequest::SetModifyOtherKeys(mode));
                continue;
            }
            Op::QueryMode => {
                state.begin(TerminalRequest::QueryModifyOtherKeys);
                assert!(state.is_awaiting(Capability::ModifyOtherKeys));
                continue;
            }
            Op::QueryVersion => {
                state.begin(TerminalRequest::QueryTerminalVersion);
                assert!(state.is_awaiting(Capability::TerminalVersion));
                continue;
            }
            Op::ModeReport(n) => format!("\x1b[>4;{n}m").into_bytes(),
            Op::VersionReport(text) => {
                let mut bytes = b"\x1bP>|".to_vec();
                bytes.extend(text.into_iter().filter(|&b| b != 0x1B));
                bytes.extend_from_slice(b"\x1b\\");
                bytes
            }
            Op::Raw(bytes) => bytes,
        };

        for msg in decoder.decode(&bytes) {
            let report = msg.is_report();
            let settled = state.settle(&msg);
            assert_eq!(settled.is_some(), report, "settle disagrees with is_report");
            if let Some(settlement) = settled {
                assert!(!state.is_awaiting(settlement.capability()));
            }
        }
        assert!(state.outstanding().count() <= Capability::ALL.len());
    }
});
