#![no_main]

//! Fuzz target for the chunked decode pipeline.
//!
//! Arbitrary bytes cut at arbitrary points must yield exactly one work per
//! chunk, in submission order, and decode the same frames as scanning the
//! whole stream at once.

use arbitrary::Arbitrary;
use esframe_core::{AudioCodec, Chunk, FrameDescriptor, FrameIter};
use esframe_pipeline::{
    scanner_for, DecodeEngine, DecodePipeline, DecodedOutput, EngineError, PipelineConfig,
};
use libfuzzer_sys::fuzz_target;

struct EchoEngine;

impl DecodeEngine for EchoEngine {
    fn name(&self) -> &str {
        "echo"
    }

    fn decode(
        &mut self,
        frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        out.extend_from_slice(frame);
        Ok(Some(DecodedOutput {
            len: frame.len(),
            sample_rate: desc.sample_rate,
            channels: desc.channels,
            samples: desc.samples_per_frame,
        }))
    }
}

#[derive(Arbitrary, Debug)]
struct ChunkInput {
    dts: bool,
    data: Vec<u8>,
    cuts: Vec<u16>,
}

fuzz_target!(|input: ChunkInput| {
    if input.data.len() > 64 * 1024 || input.cuts.is_empty() {
        return;
    }
    let codec = if input.dts { AudioCodec::Dts } else { AudioCodec::Ac3 };
    let mut pipeline =
        DecodePipeline::for_codec(codec, Box::new(EchoEngine), PipelineConfig::default())
            .expect("default config is valid");

    let mut decoded = Vec::new();
    let mut pos = 0;
    let mut index = 0u64;
    for &cut in input.cuts.iter().cycle() {
        if pos >= input.data.len() {
            break;
        }
        let end = (pos + usize::from(cut).max(1)).min(input.data.len());
        let works = pipeline
            .submit(&Chunk::from_slice(index, &input.data[pos..end]))
            .expect("echo engine never fails");
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].frame_index, index);
        decoded.extend(works.into_iter().flat_map(|w| w.buffers).map(|b| b.data));
        pos = end;
        index += 1;
    }

    let scanner = scanner_for(codec);
    let whole: Vec<Vec<u8>> = FrameIter::new(scanner.as_ref(), &input.data)
        .map(|d| input.data[d.offset..d.end()].to_vec())
        .collect();
    assert_eq!(decoded, whole);
});
