//! Decode engine adapter.
//!
//! A [`DecodeEngine`] turns one delimited frame into zero or one block of
//! output bytes. Engines are treated as black boxes that may fail, may stall
//! and may change their output format from one frame to the next; the
//! [`FormatTracker`] turns the latter into explicit [`FormatChange`] events.

use esframe_core::{channel_mask_for_count, ChannelMask, FrameDescriptor};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Engine error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The frame could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The engine did not answer in time.
    #[error("Engine timed out after {0:?}")]
    Timeout(Duration),

    /// The engine cannot handle this input.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The engine ran out of a resource it cannot recover.
    #[error("Engine resource failure: {0}")]
    Resource(String),
}

impl EngineError {
    /// Check if this error ends the pipeline instance.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Resource(_))
    }
}

/// Metadata of one decoded output block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedOutput {
    /// Bytes appended to the output vector.
    pub len: usize,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u32,
    /// Samples per channel represented by the block.
    pub samples: u32,
}

impl DecodedOutput {
    /// Duration of the block in microseconds.
    pub fn duration_us(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        i64::from(self.samples) * 1_000_000 / i64::from(self.sample_rate)
    }
}

/// Frame-in, bytes-out decoder seam.
pub trait DecodeEngine: Send {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Apply out-of-band codec configuration.
    fn configure(&mut self, _codec_config: &[u8]) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decode one frame, appending output bytes to `out`.
    ///
    /// `Ok(None)` means the frame was consumed without producing output yet.
    fn decode(
        &mut self,
        frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError>;

    /// Drop any internal state carried between frames.
    fn reset(&mut self) {}
}

impl<E: DecodeEngine + ?Sized> DecodeEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn configure(&mut self, codec_config: &[u8]) -> Result<(), EngineError> {
        (**self).configure(codec_config)
    }

    fn decode(
        &mut self,
        frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        (**self).decode(frame, desc, out)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Output format announced to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatChange {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u32,
    /// Consumer channel mask for `channels`.
    pub channel_mask: ChannelMask,
}

impl FormatChange {
    /// Describe an output format.
    pub fn new(sample_rate: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            channels,
            channel_mask: channel_mask_for_count(channels),
        }
    }
}

impl fmt::Display for FormatChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch (mask {:#x})",
            self.sample_rate,
            self.channels,
            self.channel_mask.bits()
        )
    }
}

/// Detects output format changes.
#[derive(Debug, Default)]
pub struct FormatTracker {
    current: Option<(u32, u32)>,
}

impl FormatTracker {
    /// Create a tracker with no announced format.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last announced `(sample_rate, channels)`.
    pub fn current(&self) -> Option<(u32, u32)> {
        self.current
    }

    /// Compare `output` against the announced format.
    ///
    /// Returns a change the first time a new rate or channel count is seen.
    /// Outputs with a zero rate or zero channels are invalid and never
    /// announce anything.
    pub fn observe(&mut self, output: &DecodedOutput) -> Option<FormatChange> {
        if output.sample_rate == 0 || output.channels == 0 {
            warn!(
                sample_rate = output.sample_rate,
                channels = output.channels,
                "Invalid frame format reported by engine"
            );
            return None;
        }

        let changed = match self.current {
            Some((rate, channels)) => rate != output.sample_rate || channels != output.channels,
            None => true,
        };
        if !changed {
            return None;
        }

        let change = FormatChange::new(output.sample_rate, output.channels);
        info!(
            sample_rate = change.sample_rate,
            channels = change.channels,
            channel_mask = change.channel_mask.bits(),
            "Output format changed"
        );
        self.current = Some((output.sample_rate, output.channels));
        Some(change)
    }

    /// Forget the announced format.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
