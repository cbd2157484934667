//! Fuzz target for the TDS packet header decoder.
//!
//! Checks that arbitrary bytes never panic the decoder, that the lenient
//! and strict entry points agree, and that a decoded header encodes back
//! to the bytes it came from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sqlna_core::TdsHeader;

fuzz_target!(|data: &[u8]| {
    let lenient = TdsHeader::decode(data, 0);
    let strict = TdsHeader::parse(data).ok();
    assert_eq!(lenient, strict);

    if let Some(header) = lenient {
        assert_eq!(&header.to_bytes()[..], &data[..8]);
        assert!(header.length as usize >= 8);
    }

    // Offsets past the end must not panic
    for offset in [1, data.len(), data.len() + 1] {
        let _ = TdsHeader::decode(data, offset);
    }
});
