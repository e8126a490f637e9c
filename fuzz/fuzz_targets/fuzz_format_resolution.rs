#![no_main]

use std::path::Path;

use dynprops::FormatResolver;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for name in ["app", "app.cfg", "app.properties", "app.yml", "app.yaml", "app.json"] {
        // Resolution returns a concrete format or an error, never Auto
        if let Ok(format) = FormatResolver::resolve_bytes(Path::new(name), data) {
            assert!(format.is_resolved());
        }
    }

    if let Ok(content) = std::str::from_utf8(data) {
        let _ = FormatResolver::content_hint(content);
    }
});
