//! Fuzz target: RDM6300 `FrameDecoder::feed`
//!
//! Drives arbitrary UART bytes into the streaming tag-frame decoder and
//! asserts that it never panics and that a single-frame decode agrees
//! with the streaming path.
//!
//! cargo fuzz run fuzz_rfid_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::sensors::rfid::{decode_frame, FrameDecoder, FRAME_LEN};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    let _ = decoder.feed(data);

    if data.len() == FRAME_LEN {
        if let Ok(tag) = decode_frame(data) {
            decoder.reset();
            assert_eq!(decoder.feed(data), Some(tag));
        }
    }

    decoder.reset();
    let _ = decoder.feed(data);
});
