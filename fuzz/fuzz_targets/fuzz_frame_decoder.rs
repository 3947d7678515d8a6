#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the decoders; malformed input is a
    // typed error, nothing else.
    let _ = weighbridge_hardware::protocol::decode_bcd_frame(data);
    let _ = weighbridge_hardware::protocol::decode_reversed_text(data);
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = weighbridge_hardware::protocol::parse_decimal_centi(text);
    }
});
