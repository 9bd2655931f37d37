#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Whatever parses must serialize, and the output must parse again.
    if let Ok(mut doc) = pdfkern::Document::parse(data) {
        if let Ok(out) = doc.to_bytes() {
            pdfkern::Document::parse(&out).expect("own output must re-parse");
        }
    }
});
