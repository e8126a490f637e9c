#![no_main]

use dynprops::ScalarType;
use dynprops::properties;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let content = String::from_utf8_lossy(data);

    // Bad escapes are errors, never panics
    let Ok(map) = properties::parse(&content) else {
        return;
    };

    // Every parsed value goes through every conversion without panicking
    for value in map.values() {
        for ty in [
            ScalarType::String,
            ScalarType::Int,
            ScalarType::Long,
            ScalarType::Double,
            ScalarType::Float,
            ScalarType::Bool,
            ScalarType::Date,
            ScalarType::Structural,
        ] {
            let _ = ty.convert(value);
        }
    }

    // Continuation and separator edge cases around the fuzzed text
    let wrapped = [
        format!("key={content}"),
        format!("key=\\\n{content}"),
        format!("{content}\\"),
        format!("k\\u{content}"),
    ];
    for text in &wrapped {
        let _ = properties::parse(text);
    }
});
