#![no_main]

//! Fuzz target for IEC 61937 burst packing.
//!
//! Every burst must start with the preamble and fill its repetition period.

use arbitrary::Arbitrary;
use esframe_core::{AudioCodec, FrameIter};
use esframe_pipeline::{scanner_for, DecodeEngine, Link, PassthroughEngine};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct BurstInput {
    hdmi: bool,
    family: u8,
    data: Vec<u8>,
}

fuzz_target!(|input: BurstInput| {
    if input.data.len() > 128 * 1024 {
        return;
    }
    let codec = match input.family % 3 {
        0 => AudioCodec::Ac3,
        1 => AudioCodec::Dts,
        _ => AudioCodec::Aac,
    };
    let link = if input.hdmi { Link::Hdmi } else { Link::Spdif };
    let Ok(mut engine) = PassthroughEngine::new(link, codec) else {
        return;
    };

    let scanner = scanner_for(codec);
    for desc in FrameIter::new(scanner.as_ref(), &input.data) {
        let mut out = Vec::new();
        if let Ok(Some(output)) = engine.decode(&input.data[desc.offset..desc.end()], &desc, &mut out) {
            assert_eq!(out.len(), output.len);
            assert_eq!(&out[..4], &[0x72, 0xF8, 0x1F, 0x4E]);
        }
    }
});
