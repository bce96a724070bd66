#![no_main]

use libfuzzer_sys::fuzz_target;
use sql_destination::ident::check_identifier;

// The sanitizer must never panic on arbitrary bytes, and sanitize mode must
// be idempotent: running it twice always yields the same string as once.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let mut once = input.to_string();
    if check_identifier(&mut once, true).is_err() {
        unreachable!("sanitize mode never fails");
    }

    let mut twice = once.clone();
    check_identifier(&mut twice, true).unwrap();
    assert_eq!(once, twice);
});
