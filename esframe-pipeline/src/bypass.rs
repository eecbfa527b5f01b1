//! Elementary-stream bypass.
//!
//! The stream is not parsed at all: incoming bytes are cut into blocks of at
//! most [`BYPASS_BLOCK_LEN`] bytes and each block is copied into a
//! zero-padded output buffer of exactly that size. Downstream sees a
//! constant-rate stereo 16-bit stream.

use crate::engine::{DecodeEngine, DecodedOutput, EngineError};
use esframe_core::error::{Malformation, ScanError};
use esframe_core::{AudioCodec, FrameDescriptor, FrameHeader, FrameScanner, HeaderFields, SyncByteOrder};

/// Size of every bypass output buffer.
pub const BYPASS_BLOCK_LEN: usize = 6144;

/// Rate reported for bypass output.
const BYPASS_SAMPLE_RATE: u32 = 48000;
/// Channels reported for bypass output.
const BYPASS_CHANNELS: u32 = 2;

/// Scanner that treats whatever bytes are available as one frame.
#[derive(Debug, Clone, Copy)]
pub struct BypassScanner {
    codec: AudioCodec,
}

impl BypassScanner {
    /// Create a bypass scanner labelling frames as `codec`.
    pub fn new(codec: AudioCodec) -> Self {
        Self { codec }
    }

    fn header(&self, length: usize) -> FrameHeader {
        FrameHeader {
            codec: self.codec,
            length,
            sample_rate: BYPASS_SAMPLE_RATE,
            channels: BYPASS_CHANNELS,
            samples_per_frame: (BYPASS_BLOCK_LEN / 4) as u32,
            fields: HeaderFields::default(),
        }
    }
}

impl FrameScanner for BypassScanner {
    fn name(&self) -> &'static str {
        "es-bypass"
    }

    fn codec(&self) -> AudioCodec {
        self.codec
    }

    fn sync_len(&self) -> usize {
        0
    }

    fn header_len(&self) -> usize {
        0
    }

    fn find_sync(&self, window: &[u8]) -> Option<(usize, SyncByteOrder)> {
        (!window.is_empty()).then_some((0, SyncByteOrder::Native))
    }

    fn parse_header(&self, header: &[u8]) -> Result<FrameHeader, Malformation> {
        Ok(self.header(header.len()))
    }

    fn scan(&self, window: &[u8]) -> Result<FrameDescriptor, ScanError> {
        if window.is_empty() {
            return Err(ScanError::NeedMoreData { offset: None });
        }
        let length = window.len().min(BYPASS_BLOCK_LEN);
        Ok(FrameDescriptor::new(
            0,
            SyncByteOrder::Native,
            self.header(length),
        ))
    }
}

/// Engine copying each block into a zero-padded output buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct EsBypassEngine;

impl EsBypassEngine {
    /// Create a bypass engine.
    pub fn new() -> Self {
        Self
    }
}

impl DecodeEngine for EsBypassEngine {
    fn name(&self) -> &str {
        "es-bypass"
    }

    fn decode(
        &mut self,
        frame: &[u8],
        _desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        if frame.len() > BYPASS_BLOCK_LEN {
            return Err(EngineError::Decode(format!(
                "{}-byte block exceeds {BYPASS_BLOCK_LEN} bytes",
                frame.len()
            )));
        }
        let start = out.len();
        out.resize(start + BYPASS_BLOCK_LEN, 0);
        out[start..start + frame.len()].copy_from_slice(frame);

        Ok(Some(DecodedOutput {
            len: BYPASS_BLOCK_LEN,
            sample_rate: BYPASS_SAMPLE_RATE,
            channels: BYPASS_CHANNELS,
            samples: (BYPASS_BLOCK_LEN / 4) as u32,
        }))
    }
}
