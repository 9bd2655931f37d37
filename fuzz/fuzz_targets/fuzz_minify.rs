#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Errors are fine; a successful minification must be idempotent.
    if let Ok(once) = pdfkern::minify_content_stream(data) {
        let twice = pdfkern::minify_content_stream(&once).expect("minified output must re-minify");
        assert_eq!(once, twice);
    }
});
