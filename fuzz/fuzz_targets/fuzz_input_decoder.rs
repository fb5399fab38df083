#![no_main]

use libfuzzer_sys::fuzz_target;
use modkeys_core::decoder::InputDecoder;
use modkeys_core::event::InputMsg;

fn decode_chunks<'a>(chunks: impl Iterator<Item = &'a [u8]>) -> Vec<InputMsg> {
    let mut decoder = InputDecoder::new();
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(decoder.decode(chunk));
    }
    out.extend(decoder.flush());
    out
}

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size used for the split decode.
    let Some((&split, payload)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(split % 16) + 1;

    let whole = decode_chunks(std::iter::once(payload));
    let chunked = decode_chunks(payload.chunks(chunk));
    assert_eq!(whole, chunked, "chunking changed decoder output");

    for msg in &whole {
        if let InputMsg::KeyPress(key) = msg {
            assert!(
                key.text.is_empty() || key.modifiers.is_text_compatible(),
                "text on a modified key"
            );
        }
    }
});
