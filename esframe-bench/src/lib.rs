//! Benchmark fixtures for esframe.
//!
//! Synthetic streams and a do-nothing engine, shared by the criterion
//! benches so they measure framing and pairing rather than decoding.

use esframe_aac::AdtsHeader;
use esframe_ac3::Ac3FrameBuilder;
use esframe_core::{AudioCodec, FrameDescriptor};
use esframe_dts::DtsFrameBuilder;
use esframe_pipeline::{DecodeEngine, DecodedOutput, EngineError};

/// Junk inserted between frames; never contains a sync pattern of any family.
const JUNK: [u8; 5] = [0x20, 0x31, 0x42, 0x53, 0x64];

/// A stream of `frames` frames of `codec`, with junk after every `junk_every`
/// frames (0 for none).
pub fn synthetic_stream(codec: AudioCodec, frames: usize, junk_every: usize) -> Vec<u8> {
    let frame = match codec {
        AudioCodec::Ac3 => Ac3FrameBuilder::ac3(0, 14).build(),
        AudioCodec::Eac3 => Ac3FrameBuilder::eac3(0, 3, 383).build(),
        AudioCodec::Dts => DtsFrameBuilder::new(15, 1005).build(),
        AudioCodec::Aac => AdtsHeader::new(512).build_frame(),
    };
    let mut data = Vec::with_capacity(frames * (frame.len() + JUNK.len()));
    for i in 0..frames {
        data.extend_from_slice(&frame);
        if junk_every > 0 && (i + 1) % junk_every == 0 {
            data.extend_from_slice(&JUNK);
        }
    }
    data
}

/// Reports one block per frame without touching the payload.
#[derive(Debug, Default)]
pub struct NullEngine;

impl DecodeEngine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    fn decode(
        &mut self,
        _frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        out.extend_from_slice(&[0; 4]);
        Ok(Some(DecodedOutput {
            len: 4,
            sample_rate: desc.sample_rate,
            channels: desc.channels,
            samples: desc.samples_per_frame,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esframe_core::FrameIter;
    use esframe_pipeline::scanner_for;

    #[test]
    fn test_synthetic_streams_scan() {
        for codec in AudioCodec::ALL {
            let data = synthetic_stream(codec, 10, 3);
            let scanner = scanner_for(codec);
            assert_eq!(FrameIter::new(scanner.as_ref(), &data).count(), 10, "{codec}");
        }
    }
}
