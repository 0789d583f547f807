#![no_main]

use bagit_core::serialize::text;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let _ = text::parse_declaration(input);
    let _ = text::parse_metadata(input);
    let _ = text::parse_fetch(input);
    if let Ok(lines) = text::parse_manifest(input) {
        for (_, path) in lines {
            assert_eq!(text::decode_path(&text::encode_path(&path)), path);
        }
    }
});
