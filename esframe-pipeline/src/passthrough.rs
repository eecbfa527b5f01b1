//! Compressed passthrough over S/PDIF and HDMI (IEC 61937).
//!
//! Each frame is wrapped in a data burst: four 16-bit preamble words
//! (Pa, Pb sync; Pc data type; Pd payload length) followed by the payload as
//! little-endian 16-bit words and zero padding up to the repetition period of
//! the codec. The receiver sees a stereo 16-bit PCM stream at the burst rate.
//!
//! E-AC-3 needs the high-bitrate HDMI link: frames are gathered until six
//! audio blocks are available and sent as one burst four times the frame
//! sample rate.

use crate::config::OutputMode;
use crate::engine::{DecodeEngine, DecodedOutput, EngineError};
use byteorder::{ByteOrder, LittleEndian};
use esframe_core::{AudioCodec, FrameDescriptor, SyncByteOrder};
use std::fmt;
use tracing::{debug, trace};

/// Burst sync word Pa.
pub const IEC61937_SYNC1: u16 = 0xF872;
/// Burst sync word Pb.
pub const IEC61937_SYNC2: u16 = 0x4E1F;
/// Burst preamble length in bytes.
pub const BURST_HEADER_LEN: usize = 8;

/// Burst-rate multiple of the source sample rate for E-AC-3.
const EAC3_RATE_MULTIPLIER: u32 = 4;
/// Blocks gathered into one E-AC-3 burst.
const EAC3_BLOCKS_PER_BURST: u32 = 6;
/// Bytes per stereo 16-bit sample pair on the link.
const BYTES_PER_LINK_SAMPLE: usize = 4;

/// IEC 61937 data types (Pc bits 0-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DataType {
    /// AC-3.
    Ac3 = 0x01,
    /// MPEG-2 AAC, 1024 samples.
    Mpeg2Aac = 0x07,
    /// DTS type I, 512 samples.
    Dts1 = 0x0B,
    /// DTS type II, 1024 samples.
    Dts2 = 0x0C,
    /// DTS type III, 2048 samples.
    Dts3 = 0x0D,
    /// MPEG-2 AAC low sampling frequency, 2048 samples.
    Mpeg2AacLsf2048 = 0x13,
    /// E-AC-3.
    Eac3 = 0x15,
    /// MPEG-2 AAC low sampling frequency, 4096 samples.
    Mpeg2AacLsf4096 = 0x33,
}

impl DataType {
    /// Data type and repetition period (in link samples) for a frame.
    pub fn for_frame(desc: &FrameDescriptor) -> Result<(Self, u32), EngineError> {
        let samples = desc.samples_per_frame;
        let data_type = match desc.codec {
            AudioCodec::Ac3 => DataType::Ac3,
            AudioCodec::Eac3 => DataType::Eac3,
            AudioCodec::Dts => match samples {
                512 => DataType::Dts1,
                1024 => DataType::Dts2,
                2048 => DataType::Dts3,
                _ => return Err(unsupported_samples(desc)),
            },
            AudioCodec::Aac => match samples {
                1024 => DataType::Mpeg2Aac,
                2048 => DataType::Mpeg2AacLsf2048,
                4096 => DataType::Mpeg2AacLsf4096,
                _ => return Err(unsupported_samples(desc)),
            },
        };
        let period = match data_type {
            DataType::Eac3 => samples.max(1536) * EAC3_RATE_MULTIPLIER,
            _ => samples,
        };
        Ok((data_type, period))
    }
}

fn unsupported_samples(desc: &FrameDescriptor) -> EngineError {
    EngineError::Unsupported(format!(
        "{} frame with {} samples",
        desc.codec, desc.samples_per_frame
    ))
}

/// Physical link the bursts are sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    /// S/PDIF (IEC 60958), limited to the basic data rate.
    Spdif,
    /// HDMI, allowing high-bitrate formats.
    Hdmi,
}

impl Link {
    /// Link used by an output mode, if it is a passthrough mode.
    pub fn from_mode(mode: OutputMode) -> Option<Self> {
        match mode {
            OutputMode::Spdif => Some(Link::Spdif),
            OutputMode::Hdmi => Some(Link::Hdmi),
            OutputMode::Decode | OutputMode::EsBypass => None,
        }
    }

    fn carries(&self, codec: AudioCodec) -> bool {
        !(matches!(self, Link::Spdif) && codec == AudioCodec::Eac3)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Spdif => write!(f, "S/PDIF"),
            Link::Hdmi => write!(f, "HDMI"),
        }
    }
}

/// E-AC-3 frames waiting for a complete burst.
#[derive(Debug, Default)]
struct Eac3Gather {
    payload: Vec<u8>,
    blocks: u32,
}

/// Engine producing IEC 61937 bursts instead of PCM.
#[derive(Debug)]
pub struct PassthroughEngine {
    link: Link,
    gather: Eac3Gather,
    bursts: u64,
}

impl PassthroughEngine {
    /// Create an engine for `codec` over `link`.
    pub fn new(link: Link, codec: AudioCodec) -> Result<Self, EngineError> {
        if !link.carries(codec) {
            return Err(EngineError::Unsupported(format!(
                "{codec} passthrough requires HDMI, not {link}"
            )));
        }
        Ok(Self {
            link,
            gather: Eac3Gather::default(),
            bursts: 0,
        })
    }

    /// The link bursts are packed for.
    pub fn link(&self) -> Link {
        self.link
    }

    /// Number of bursts produced.
    pub fn bursts(&self) -> u64 {
        self.bursts
    }

    fn decode_eac3(
        &mut self,
        frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        let (_, period) = DataType::for_frame(desc)?;
        let period_bytes = period as usize * BYTES_PER_LINK_SAMPLE;

        if BURST_HEADER_LEN + self.gather.payload.len() + even_len(frame.len()) > period_bytes {
            self.gather = Eac3Gather::default();
            return Err(EngineError::Decode(format!(
                "E-AC-3 frames exceed the {period_bytes}-byte burst"
            )));
        }
        append_le_words(&mut self.gather.payload, frame, desc.byte_order);
        // Dependent substreams ride along with their independent frame.
        if eac3_stream_type(frame, desc.byte_order) != Some(1) {
            self.gather.blocks += u32::from(desc.fields.blocks);
        }
        if self.gather.blocks < EAC3_BLOCKS_PER_BURST {
            trace!(blocks = self.gather.blocks, "Gathering E-AC-3 frames");
            return Ok(None);
        }

        let gathered = std::mem::take(&mut self.gather);
        let length_code = u16::try_from(gathered.payload.len()).map_err(|_| {
            EngineError::Decode(format!("burst payload of {} bytes", gathered.payload.len()))
        })?;
        write_burst(
            out,
            DataType::Eac3 as u16,
            length_code,
            &gathered.payload,
            period_bytes,
        );
        self.bursts += 1;
        Ok(Some(DecodedOutput {
            len: period_bytes,
            sample_rate: desc.sample_rate * EAC3_RATE_MULTIPLIER,
            channels: 2,
            samples: period,
        }))
    }
}

impl DecodeEngine for PassthroughEngine {
    fn name(&self) -> &str {
        match self.link {
            Link::Spdif => "iec61937-spdif",
            Link::Hdmi => "iec61937-hdmi",
        }
    }

    fn decode(
        &mut self,
        frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        if !self.link.carries(desc.codec) {
            return Err(EngineError::Unsupported(format!(
                "{} frame on {}",
                desc.codec, self.link
            )));
        }
        if desc.codec == AudioCodec::Eac3 {
            return self.decode_eac3(frame, desc, out);
        }

        let (data_type, period) = DataType::for_frame(desc)?;
        let period_bytes = period as usize * BYTES_PER_LINK_SAMPLE;
        if BURST_HEADER_LEN + even_len(frame.len()) > period_bytes {
            return Err(EngineError::Decode(format!(
                "{}-byte frame does not fit a {period_bytes}-byte burst",
                frame.len()
            )));
        }
        let length_bits = u16::try_from(frame.len() * 8)
            .map_err(|_| EngineError::Decode(format!("{}-byte frame", frame.len())))?;

        let mut pc = data_type as u16;
        if data_type == DataType::Ac3 {
            // bsmod occupies the data-type-dependent bits.
            let bsmod = native_byte(frame, desc.byte_order, 5).map_or(0, |b| b & 0x7);
            pc |= u16::from(bsmod) << 8;
        }

        let mut payload = Vec::with_capacity(even_len(frame.len()));
        append_le_words(&mut payload, frame, desc.byte_order);
        write_burst(out, pc, length_bits, &payload, period_bytes);
        self.bursts += 1;

        Ok(Some(DecodedOutput {
            len: period_bytes,
            sample_rate: desc.sample_rate,
            channels: 2,
            samples: period,
        }))
    }

    fn reset(&mut self) {
        if !self.gather.payload.is_empty() {
            debug!(
                bytes = self.gather.payload.len(),
                "Dropping partially gathered E-AC-3 burst"
            );
        }
        self.gather = Eac3Gather::default();
    }
}

fn even_len(len: usize) -> usize {
    len + (len & 1)
}

/// Byte `index` of the frame as it would read in native order.
fn native_byte(frame: &[u8], order: SyncByteOrder, index: usize) -> Option<u8> {
    match order {
        SyncByteOrder::Native => frame.get(index).copied(),
        SyncByteOrder::Swapped16 => frame.get(index ^ 1).copied(),
    }
}

fn eac3_stream_type(frame: &[u8], order: SyncByteOrder) -> Option<u8> {
    native_byte(frame, order, 2).map(|b| b >> 6)
}

/// Append `frame` as little-endian 16-bit words.
///
/// Native-order frames are big-endian words and get swapped; frames found in
/// swapped order already are little-endian words. An odd trailing byte is
/// padded with zero.
fn append_le_words(dst: &mut Vec<u8>, frame: &[u8], order: SyncByteOrder) {
    let start = dst.len();
    dst.extend_from_slice(frame);
    if frame.len() % 2 == 1 {
        dst.push(0);
    }
    if order == SyncByteOrder::Native {
        esframe_core::scanner::swap16_in_place(&mut dst[start..]);
    }
}

fn write_burst(out: &mut Vec<u8>, pc: u16, pd: u16, payload: &[u8], period_bytes: usize) {
    let start = out.len();
    out.resize(start + period_bytes, 0);
    let burst = &mut out[start..];
    LittleEndian::write_u16(&mut burst[0..2], IEC61937_SYNC1);
    LittleEndian::write_u16(&mut burst[2..4], IEC61937_SYNC2);
    LittleEndian::write_u16(&mut burst[4..6], pc);
    LittleEndian::write_u16(&mut burst[6..8], pd);
    burst[BURST_HEADER_LEN..BURST_HEADER_LEN + payload.len()].copy_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use esframe_ac3::{Ac3FrameBuilder, Ac3Scanner};
    use esframe_aac::{AdtsHeader, AdtsScanner};
    use esframe_core::FrameScanner;
    use esframe_dts::{DtsFrameBuilder, DtsScanner};

    fn scan_one(scanner: &dyn FrameScanner, frame: &[u8]) -> FrameDescriptor {
        scanner.scan(frame).unwrap()
    }

    fn word(buf: &[u8], i: usize) -> u16 {
        LittleEndian::read_u16(&buf[i * 2..i * 2 + 2])
    }

    #[test]
    fn test_ac3_burst_layout() {
        let frame = Ac3FrameBuilder::ac3(0, 14).build();
        let desc = scan_one(&Ac3Scanner, &frame);
        let mut engine = PassthroughEngine::new(Link::Spdif, AudioCodec::Ac3).unwrap();
        let mut out = Vec::new();

        let output = engine.decode(&frame, &desc, &mut out).unwrap().unwrap();
        assert_eq!(output.len, 6144);
        assert_eq!(out.len(), 6144);
        assert_eq!(output.sample_rate, 48000);
        assert_eq!(output.channels, 2);
        assert_eq!(output.samples, 1536);

        assert_eq!(word(&out, 0), IEC61937_SYNC1);
        assert_eq!(word(&out, 1), IEC61937_SYNC2);
        assert_eq!(word(&out, 2) & 0x7F, DataType::Ac3 as u16);
        assert_eq!(usize::from(word(&out, 3)), frame.len() * 8);
        // Sync word 0x0B77 sent as a little-endian word.
        assert_eq!(&out[8..10], &[0x77, 0x0B]);
        assert!(out[8 + frame.len()..].iter().all(|&b| b == 0));
        assert_eq!(engine.bursts(), 1);
    }

    #[test]
    fn test_swapped_source_copied_verbatim() {
        let native = Ac3FrameBuilder::ac3(0, 14).build();
        let swapped = Ac3FrameBuilder::ac3(0, 14).swapped(true).build();
        let mut engine = PassthroughEngine::new(Link::Spdif, AudioCodec::Ac3).unwrap();

        let mut a = Vec::new();
        let mut b = Vec::new();
        engine
            .decode(&native, &scan_one(&Ac3Scanner, &native), &mut a)
            .unwrap();
        engine
            .decode(&swapped, &scan_one(&Ac3Scanner, &swapped), &mut b)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(&b[8..8 + swapped.len()], swapped.as_slice());
    }

    #[test]
    fn test_eac3_rejected_on_spdif() {
        assert!(matches!(
            PassthroughEngine::new(Link::Spdif, AudioCodec::Eac3),
            Err(EngineError::Unsupported(_))
        ));

        let frame = Ac3FrameBuilder::eac3(0, 3, 255).build();
        let desc = scan_one(&Ac3Scanner, &frame);
        let mut engine = PassthroughEngine::new(Link::Spdif, AudioCodec::Ac3).unwrap();
        let err = engine.decode(&frame, &desc, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_eac3_gathers_six_blocks() {
        // numblkscod 1: two blocks per frame, three frames per burst.
        let frame = Ac3FrameBuilder::eac3(0, 1, 99).build();
        let desc = scan_one(&Ac3Scanner, &frame);
        assert_eq!(desc.fields.blocks, 2);

        let mut engine = PassthroughEngine::new(Link::Hdmi, AudioCodec::Eac3).unwrap();
        let mut out = Vec::new();
        assert!(engine.decode(&frame, &desc, &mut out).unwrap().is_none());
        assert!(engine.decode(&frame, &desc, &mut out).unwrap().is_none());
        assert!(out.is_empty());

        let output = engine.decode(&frame, &desc, &mut out).unwrap().unwrap();
        assert_eq!(output.len, 24576);
        assert_eq!(output.sample_rate, 192_000);
        assert_eq!(word(&out, 2), DataType::Eac3 as u16);
        assert_eq!(usize::from(word(&out, 3)), frame.len() * 3);
    }

    #[test]
    fn test_reset_drops_gathered_frames() {
        let frame = Ac3FrameBuilder::eac3(0, 1, 99).build();
        let desc = scan_one(&Ac3Scanner, &frame);
        let mut engine = PassthroughEngine::new(Link::Hdmi, AudioCodec::Eac3).unwrap();
        let mut out = Vec::new();
        engine.decode(&frame, &desc, &mut out).unwrap();
        engine.decode(&frame, &desc, &mut out).unwrap();
        engine.reset();
        assert!(engine.decode(&frame, &desc, &mut out).unwrap().is_none());
    }

    #[test]
    fn test_dts_data_type_by_block_count() {
        // 16 blocks of 32 samples.
        let frame = DtsFrameBuilder::new(15, 1023).build();
        let desc = scan_one(&DtsScanner, &frame);
        assert_eq!(desc.samples_per_frame, 512);

        let mut engine = PassthroughEngine::new(Link::Spdif, AudioCodec::Dts).unwrap();
        let mut out = Vec::new();
        let output = engine.decode(&frame, &desc, &mut out).unwrap().unwrap();
        assert_eq!(output.len, 2048);
        assert_eq!(word(&out, 2), DataType::Dts1 as u16);
    }

    #[test]
    fn test_dts_frame_too_large_for_burst() {
        let frame = DtsFrameBuilder::new(15, 4095).build();
        let desc = scan_one(&DtsScanner, &frame);
        let mut engine = PassthroughEngine::new(Link::Hdmi, AudioCodec::Dts).unwrap();
        assert!(matches!(
            engine.decode(&frame, &desc, &mut Vec::new()),
            Err(EngineError::Decode(_))
        ));
    }

    #[test]
    fn test_aac_burst() {
        let frame = AdtsHeader::new(301).build_frame();
        let desc = scan_one(&AdtsScanner, &frame);
        let mut engine = PassthroughEngine::new(Link::Hdmi, AudioCodec::Aac).unwrap();
        let mut out = Vec::new();
        let output = engine.decode(&frame, &desc, &mut out).unwrap().unwrap();
        assert_eq!(output.len, 4096);
        assert_eq!(word(&out, 2), DataType::Mpeg2Aac as u16);
        // Odd-length frame: last byte lands in the high half of a padded word.
        assert_eq!(out[8 + 300], 0);
        assert_eq!(out[8 + 301], frame[300]);
    }

    #[test]
    fn test_link_from_mode() {
        assert_eq!(Link::from_mode(OutputMode::Spdif), Some(Link::Spdif));
        assert_eq!(Link::from_mode(OutputMode::Hdmi), Some(Link::Hdmi));
        assert_eq!(Link::from_mode(OutputMode::Decode), None);
    }
}
