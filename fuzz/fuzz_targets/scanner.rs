#![no_main]

//! Fuzz target for the frame scanners.
//!
//! Scanning arbitrary bytes must never panic, and every descriptor must
//! point inside the window it was found in.

use arbitrary::Arbitrary;
use esframe_core::{AudioCodec, FrameIter, FrameScanner, ScanError};
use esframe_pipeline::scanner_for;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Family {
    Ac3,
    Dts,
    Adts,
}

#[derive(Arbitrary, Debug)]
struct ScanInput {
    family: Family,
    data: Vec<u8>,
}

fuzz_target!(|input: ScanInput| {
    if input.data.len() > 256 * 1024 {
        return;
    }
    let codec = match input.family {
        Family::Ac3 => AudioCodec::Ac3,
        Family::Dts => AudioCodec::Dts,
        Family::Adts => AudioCodec::Aac,
    };
    let scanner = scanner_for(codec);

    match scanner.scan(&input.data) {
        Ok(desc) => {
            assert!(desc.offset + scanner.header_len() <= input.data.len());
            assert!(desc.length >= scanner.header_len());
        }
        Err(ScanError::Malformed { offset, .. }) => assert!(offset < input.data.len()),
        Err(ScanError::NeedMoreData { offset: Some(offset) }) => {
            assert!(offset < input.data.len())
        }
        Err(ScanError::NeedMoreData { offset: None }) => {}
    }

    let mut end = 0;
    for desc in FrameIter::new(scanner.as_ref(), &input.data) {
        assert!(desc.offset >= end);
        assert!(desc.end() <= input.data.len());
        end = desc.end();
    }
});
