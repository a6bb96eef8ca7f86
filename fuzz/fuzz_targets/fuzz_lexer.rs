#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // The lexer must never panic, and whatever it accepts must
    // round-trip byte-for-byte.
    if let Ok(tokens) = corten::tokenize(data) {
        let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(joined, data);
    }
});
