//! The chunk-in, work-out decode pipeline.
//!
//! [`DecodePipeline`] ties the pieces together for one stream:
//!
//! 1. the chunk is appended behind the RemainderBuffer ([`ByteCursor`]);
//! 2. the [`FrameScanner`] delimits frames in the merged window, skipping
//!    garbage and malformed sync candidates;
//! 3. every complete frame goes through the [`DecodeEngine`] and its output is
//!    attributed to the chunk being processed;
//! 4. the partial frame at the end of the window is carried over;
//! 5. the [`DrainController`] hands completed works back in frame-index order.

use crate::bypass::{BypassScanner, EsBypassEngine};
use crate::config::{OutputMode, PipelineConfig};
use crate::cursor::ByteCursor;
use crate::drain::{DrainController, DrainFailure, DrainState, EmittedWork};
use crate::dump::DebugDump;
use crate::engine::{DecodeEngine, FormatTracker};
use crate::error::{PipelineError, Result};
use crate::output::{HeapAllocator, OutputAllocator};
use crate::passthrough::{Link, PassthroughEngine};
use crate::queue::{DecodedBlock, PendingWork};
use esframe_aac::AdtsScanner;
use esframe_ac3::Ac3Scanner;
use esframe_core::error::ScanError;
use esframe_core::metrics::timed;
use esframe_core::{record_counter, record_gauge};
use esframe_core::{AudioCodec, Chunk, FrameDescriptor, FrameScanner};
use esframe_dts::DtsScanner;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

/// Counters describing what the pipeline absorbed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Frames accepted by the engine.
    pub frames_decoded: u64,
    /// Non-fatal engine failures.
    pub decode_errors: u64,
    /// Malformed sync candidates skipped.
    pub malformed_skips: u64,
    /// RemainderBuffer overflows.
    pub desync_events: u64,
    /// Bytes discarded without being decoded.
    pub bytes_dropped: u64,
    /// Units of work handed back.
    pub works_emitted: u64,
    /// Output format changes announced.
    pub format_changes: u64,
}

/// The scanner for a codec family.
pub fn scanner_for(codec: AudioCodec) -> Box<dyn FrameScanner> {
    match codec {
        AudioCodec::Ac3 | AudioCodec::Eac3 => Box::new(Ac3Scanner::new()),
        AudioCodec::Dts => Box::new(DtsScanner::new()),
        AudioCodec::Aac => Box::new(AdtsScanner::new()),
    }
}

/// Decode pipeline for one elementary stream.
pub struct DecodePipeline {
    scanner: Box<dyn FrameScanner>,
    engine: Box<dyn DecodeEngine>,
    allocator: Box<dyn OutputAllocator>,
    config: PipelineConfig,
    cursor: ByteCursor,
    controller: DrainController,
    formats: FormatTracker,
    dump: Option<DebugDump>,
    stats: PipelineStats,
    /// Works emitted by a drain that failed part-way; returned by the next
    /// flush or reset.
    undelivered: Vec<EmittedWork>,
    poisoned: bool,
}

impl DecodePipeline {
    /// Create a pipeline from its parts.
    pub fn new(
        scanner: Box<dyn FrameScanner>,
        engine: Box<dyn DecodeEngine>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let dump = config
            .debug_dump
            .then(|| DebugDump::new(config.dump_directory(), scanner.codec()));

        info!(
            scanner = scanner.name(),
            engine = engine.name(),
            mode = %config.output_mode,
            reassembly_cap = config.reassembly_cap,
            "Creating decode pipeline"
        );
        Ok(Self {
            scanner,
            engine,
            allocator: Box::new(HeapAllocator),
            cursor: ByteCursor::new(config.reassembly_cap),
            config,
            controller: DrainController::new(),
            formats: FormatTracker::new(),
            dump,
            stats: PipelineStats::default(),
            undelivered: Vec::new(),
            poisoned: false,
        })
    }

    /// Create a pipeline for `codec` around a caller-supplied engine.
    ///
    /// In [`OutputMode::EsBypass`] the stream is cut into fixed blocks
    /// instead of being scanned.
    pub fn for_codec(
        codec: AudioCodec,
        engine: Box<dyn DecodeEngine>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let scanner: Box<dyn FrameScanner> = match config.output_mode {
            OutputMode::EsBypass => Box::new(BypassScanner::new(codec)),
            _ => scanner_for(codec),
        };
        Self::new(scanner, engine, config)
    }

    /// Create a pipeline for `codec` with the engine the output mode implies.
    pub fn from_config(codec: AudioCodec, config: PipelineConfig) -> Result<Self> {
        let engine: Box<dyn DecodeEngine> = match config.output_mode {
            OutputMode::Spdif | OutputMode::Hdmi => {
                let link = Link::from_mode(config.output_mode).ok_or_else(|| {
                    PipelineError::InvalidConfig(format!("{} is not a passthrough mode", config.output_mode))
                })?;
                Box::new(
                    PassthroughEngine::new(link, codec)
                        .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?,
                )
            }
            OutputMode::EsBypass => Box::new(EsBypassEngine::new()),
            OutputMode::Decode => default_decoder(codec, &config)?,
        };
        Self::for_codec(codec, engine, config)
    }

    /// Replace the output allocator.
    #[must_use]
    pub fn with_allocator(mut self, allocator: impl OutputAllocator + 'static) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    /// Process one chunk and return the works ready for the host.
    pub fn submit(&mut self, chunk: &Chunk<'_>) -> Result<Vec<EmittedWork>> {
        if self.poisoned {
            return Err(PipelineError::Poisoned);
        }

        let work = PendingWork::new(chunk.frame_index, chunk.timestamp)
            .with_codec_config(chunk.is_codec_config())
            .with_end_of_stream(chunk.is_end_of_stream());
        self.controller.begin(work)?;

        if self.config.verbose_logging {
            debug!(frame_index = chunk.frame_index, len = chunk.size(), flags = ?chunk.flags, "Chunk");
        } else {
            trace!(frame_index = chunk.frame_index, len = chunk.size(), "Chunk");
        }
        if let Some(dump) = &self.dump {
            dump.input(chunk.data());
        }

        let processed = if chunk.is_codec_config() {
            self.configure(chunk.data())
        } else {
            self.scan_and_decode(chunk.data())
        };
        self.controller.complete()?;
        record_gauge!("esframe.cursor.remainder_bytes", self.cursor.remainder_len() as f64);
        if let Err(e) = processed {
            if e.is_fatal() {
                self.poison(&e);
            }
            return Err(e);
        }

        if chunk.is_end_of_stream() {
            self.discard_remainder();
            let drained = self.controller.drain_eos(&mut *self.allocator);
            self.deliver(drained)
        } else {
            let drained = self.controller.drain_ready(&mut *self.allocator);
            self.deliver(drained)
        }
    }

    /// Emit every pending work without output and start over from a clean
    /// reassembly state.
    pub fn flush(&mut self) -> Vec<EmittedWork> {
        let mut emitted = std::mem::take(&mut self.undelivered);
        let flushed = self.controller.flush();
        self.stats.works_emitted += flushed.len() as u64;
        emitted.extend(flushed);

        self.discard_remainder();
        self.formats.reset();
        self.engine.reset();
        info!(works = emitted.len(), "Pipeline flushed");
        emitted
    }

    /// Emit every pending work with its output; the last is marked
    /// end-of-stream.
    pub fn drain_eos(&mut self) -> Result<Vec<EmittedWork>> {
        if self.poisoned {
            return Err(PipelineError::Poisoned);
        }
        self.discard_remainder();
        let drained = self.controller.drain_eos(&mut *self.allocator);
        self.deliver(drained)
    }

    /// Flush, forget the frame-index history and clear a poisoned state.
    pub fn reset(&mut self) -> Vec<EmittedWork> {
        let emitted = self.flush();
        self.controller.reset();
        if self.poisoned {
            info!("Clearing poisoned pipeline state");
        }
        self.poisoned = false;
        emitted
    }

    /// Counters so far.
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Drain state.
    pub fn state(&self) -> DrainState {
        self.controller.state()
    }

    /// Configuration the pipeline was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Check if a resource failure requires a reset.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Bytes currently carried between chunks.
    pub fn remainder_len(&self) -> usize {
        self.cursor.remainder_len()
    }

    /// Name of the scanner in use.
    pub fn scanner_name(&self) -> &'static str {
        self.scanner.name()
    }

    /// Name of the engine in use.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    fn configure(&mut self, codec_config: &[u8]) -> Result<()> {
        match self.engine.configure(codec_config) {
            Ok(()) => {
                debug!(len = codec_config.len(), engine = self.engine.name(), "Codec configuration applied");
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!(error = %e, "Codec configuration rejected");
                Ok(())
            }
        }
    }

    fn scan_and_decode(&mut self, data: &[u8]) -> Result<()> {
        let Self {
            scanner,
            engine,
            config,
            cursor,
            controller,
            formats,
            stats,
            ..
        } = self;
        let cap = cursor.cap();
        let mut sink = FrameSink {
            engine: engine.as_mut(),
            controller,
            formats,
            stats,
            verbose: config.verbose_logging,
        };

        let mut window = cursor.merge(data);
        let mut fatal = None;
        loop {
            let bytes = window.bytes();
            if bytes.is_empty() {
                break;
            }

            let step = match scanner.scan(bytes) {
                Ok(desc) if desc.end() <= bytes.len() => {
                    sink.stats.bytes_dropped += desc.offset as u64;
                    record_counter!("esframe.scan.frames", 1u64);
                    if let Err(e) = sink.decode(&bytes[desc.offset..desc.end()], &desc) {
                        fatal = Some(e);
                    }
                    Step::Advance(desc.end())
                }
                Ok(desc) if desc.length > cap => {
                    sink.malformed(desc.offset, "frame longer than the reassembly cap");
                    Step::Advance(desc.offset + 1)
                }
                Ok(desc) => Step::Wait(desc.offset),
                Err(ScanError::Malformed { offset, reason }) => {
                    sink.malformed(offset, &reason.to_string());
                    Step::Advance(offset + 1)
                }
                Err(ScanError::NeedMoreData { offset: Some(offset) }) => Step::Wait(offset),
                Err(ScanError::NeedMoreData { offset: None }) => {
                    // A sync pattern may straddle the chunk boundary.
                    let keep = scanner.sync_len().saturating_sub(1).min(bytes.len());
                    Step::Wait(bytes.len() - keep)
                }
            };

            match step {
                Step::Advance(n) => window.consume(n),
                Step::Wait(skip) => {
                    sink.stats.bytes_dropped += skip as u64;
                    window.consume(skip);
                    break;
                }
            }
            if fatal.is_some() {
                break;
            }
        }

        if let Err(desync) = window.finish() {
            sink.stats.desync_events += 1;
            sink.stats.bytes_dropped += desync.dropped as u64;
            record_counter!("esframe.cursor.desync_bytes", desync.dropped as u64);
        }
        fatal.map_or(Ok(()), Err)
    }

    fn deliver(
        &mut self,
        drained: std::result::Result<Vec<EmittedWork>, DrainFailure>,
    ) -> Result<Vec<EmittedWork>> {
        match drained {
            Ok(works) => {
                self.account(&works);
                Ok(works)
            }
            Err(DrainFailure { emitted, error }) => {
                self.account(&emitted);
                self.undelivered.extend(emitted);
                let err = PipelineError::from(error);
                self.poison(&err);
                Err(err)
            }
        }
    }

    fn account(&mut self, works: &[EmittedWork]) {
        self.stats.works_emitted += works.len() as u64;
        if let Some(dump) = &self.dump {
            for buffer in works.iter().flat_map(|w| &w.buffers) {
                dump.output(&buffer.data);
            }
        }
    }

    fn discard_remainder(&mut self) {
        let dropped = self.cursor.reset();
        if dropped > 0 {
            debug!(dropped, "Discarding partial frame");
            self.stats.bytes_dropped += dropped as u64;
        }
    }

    fn poison(&mut self, err: &PipelineError) {
        error!(error = %err, "Fatal pipeline error, reset required");
        self.poisoned = true;
    }
}

impl std::fmt::Debug for DecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePipeline")
            .field("scanner", &self.scanner.name())
            .field("engine", &self.engine.name())
            .field("state", &self.controller.state())
            .field("remainder", &self.cursor.remainder_len())
            .field("stats", &self.stats)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

enum Step {
    /// Consume this many bytes and keep scanning.
    Advance(usize),
    /// Drop this many leading bytes and wait for the next chunk.
    Wait(usize),
}

/// The parts of the pipeline a delimited frame flows through.
struct FrameSink<'p> {
    engine: &'p mut dyn DecodeEngine,
    controller: &'p mut DrainController,
    formats: &'p mut FormatTracker,
    stats: &'p mut PipelineStats,
    verbose: bool,
}

impl FrameSink<'_> {
    fn decode(&mut self, frame: &[u8], desc: &FrameDescriptor) -> Result<()> {
        if self.verbose {
            debug!(offset = desc.offset, len = desc.length, codec = %desc.codec, rate = desc.sample_rate, "Frame");
        } else {
            trace!(offset = desc.offset, len = desc.length, codec = %desc.codec, "Frame");
        }

        let mut out = Vec::new();
        let result = timed("esframe.decode.duration_ns", || self.engine.decode(frame, desc, &mut out));

        match result {
            Ok(Some(output)) => {
                self.stats.frames_decoded += 1;
                if let Some(change) = self.formats.observe(&output) {
                    self.stats.format_changes += 1;
                    self.controller.announce_format(change);
                }
                self.controller.record(DecodedBlock { output, data: out })?;
            }
            Ok(None) => {
                self.stats.frames_decoded += 1;
                trace!(offset = desc.offset, "Frame consumed without output");
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                self.stats.decode_errors += 1;
                record_counter!("esframe.decode.errors", 1u64);
                warn!(offset = desc.offset, len = desc.length, error = %e, "Frame decode failed, continuing");
            }
        }
        Ok(())
    }

    fn malformed(&mut self, offset: usize, reason: &str) {
        self.stats.malformed_skips += 1;
        self.stats.bytes_dropped += offset as u64 + 1;
        record_counter!("esframe.scan.malformed", 1u64);
        trace!(offset, reason, "Skipping malformed sync candidate");
    }
}

#[cfg(feature = "ffi-ffmpeg")]
fn default_decoder(codec: AudioCodec, config: &PipelineConfig) -> Result<Box<dyn DecodeEngine>> {
    let engine = crate::ffi::FfmpegEngine::new(codec)?;
    let threaded = crate::threaded::ThreadedEngine::spawn(engine, config.engine_timeout())?;
    Ok(Box::new(threaded))
}

#[cfg(not(feature = "ffi-ffmpeg"))]
fn default_decoder(codec: AudioCodec, _config: &PipelineConfig) -> Result<Box<dyn DecodeEngine>> {
    Err(PipelineError::InvalidConfig(format!(
        "no built-in {codec} decoder; enable the ffi-ffmpeg feature or supply an engine"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DecodedOutput, EngineError};
    use esframe_ac3::Ac3FrameBuilder;
    use esframe_core::ChunkFlags;

    /// Emits four bytes per frame: the frame length as little-endian u32.
    struct LengthEngine;

    impl DecodeEngine for LengthEngine {
        fn name(&self) -> &str {
            "length"
        }

        fn decode(
            &mut self,
            frame: &[u8],
            desc: &FrameDescriptor,
            out: &mut Vec<u8>,
        ) -> std::result::Result<Option<DecodedOutput>, EngineError> {
            out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            Ok(Some(DecodedOutput {
                len: 4,
                sample_rate: desc.sample_rate,
                channels: desc.channels,
                samples: desc.samples_per_frame,
            }))
        }
    }

    fn pipeline() -> DecodePipeline {
        DecodePipeline::for_codec(AudioCodec::Ac3, Box::new(LengthEngine), PipelineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let frame = Ac3FrameBuilder::ac3(0, 14).build();
        let (a, b) = frame.split_at(5);
        let mut p = pipeline();

        let works = p.submit(&Chunk::from_slice(0, a)).unwrap();
        assert_eq!(works.len(), 1);
        assert!(works[0].is_empty());
        assert_eq!(p.remainder_len(), 5);

        let works = p.submit(&Chunk::from_slice(1, b)).unwrap();
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].buffers.len(), 1);
        assert_eq!(works[0].buffers[0].data, (frame.len() as u32).to_le_bytes());
        assert!(works[0].format_change.is_some());
        assert_eq!(p.remainder_len(), 0);
        assert_eq!(p.stats().frames_decoded, 1);
    }

    #[test]
    fn test_non_monotonic_index_rejected() {
        let mut p = pipeline();
        p.submit(&Chunk::from_slice(4, &[])).unwrap();
        let err = p.submit(&Chunk::from_slice(4, &[])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NonMonotonicIndex { previous: 4, got: 4 }
        ));
        assert!(!p.is_poisoned());
        assert!(p.submit(&Chunk::from_slice(5, &[])).is_ok());
    }

    #[test]
    fn test_codec_config_chunk() {
        let mut p = pipeline();
        let chunk = Chunk::from_slice(0, &[1, 2, 3]).with_flags(ChunkFlags::CODEC_CONFIG);
        let works = p.submit(&chunk).unwrap();
        assert_eq!(works.len(), 1);
        assert!(works[0].codec_config);
        assert!(works[0].is_empty());
        assert_eq!(p.remainder_len(), 0);
    }

    #[test]
    fn test_eos_chunk_drops_partial_frame() {
        let frame = Ac3FrameBuilder::ac3(0, 14).build();
        let mut p = pipeline();
        let chunk = Chunk::from_slice(0, &frame[..100]).with_flags(ChunkFlags::END_OF_STREAM);
        let works = p.submit(&chunk).unwrap();
        assert_eq!(works.len(), 1);
        assert!(works[0].end_of_stream);
        assert_eq!(p.remainder_len(), 0);
        assert_eq!(p.stats().bytes_dropped, 100);
    }

    #[cfg(not(feature = "ffi-ffmpeg"))]
    #[test]
    fn test_from_config_without_decoder() {
        assert!(matches!(
            DecodePipeline::from_config(AudioCodec::Ac3, PipelineConfig::default()),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_config_passthrough() {
        assert!(matches!(
            DecodePipeline::from_config(
                AudioCodec::Eac3,
                PipelineConfig::default().with_output_mode(OutputMode::Spdif)
            ),
            Err(PipelineError::InvalidConfig(_))
        ));
        let p = DecodePipeline::from_config(
            AudioCodec::Dts,
            PipelineConfig::default().with_output_mode(OutputMode::Hdmi),
        )
        .unwrap();
        assert_eq!(p.engine_name(), "iec61937-hdmi");
        assert_eq!(p.scanner_name(), "dts");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig::default().with_reassembly_cap(1);
        assert!(DecodePipeline::for_codec(AudioCodec::Ac3, Box::new(LengthEngine), config).is_err());
    }
}
